//! Rapport de construction d'une carte avec graceful degradation
//!
//! Chaque couche (établissement focal puis concurrents) est résumée avec
//! sa couverture; les couches en échec sont listées sans faire échouer
//! l'ensemble. L'appelant reçoit toujours soit un résultat sain, soit un
//! résultat dégradé avec avertissement, soit un diagnostic exploitable.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::allocate::{AllocationPolicy, ChoroplethResult};
use crate::coverage::CoverageStatus;

/// Statut global de la construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CarteStatus {
    /// Toutes les couches sont saines
    Complete,
    /// Au moins une couche dégradée ou en échec, résultat rendu quand même
    Partial,
    /// Aucune couche exploitable
    Failed,
}

/// Résumé d'une couche choroplèthe
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    /// 0 pour l'établissement focal, 1..5 pour les concurrents classés
    pub rang: usize,
    pub finess: String,
    pub nom: Option<String>,
    /// Nombre de communes portant une valeur
    pub communes: usize,
    pub coverage_ratio: f64,
    pub status: CoverageStatus,
    pub unmatched_postals: Vec<String>,
    pub unmatched_insee: Vec<String>,
    pub original_total: f64,
    pub allocated_total: f64,
    pub policy: AllocationPolicy,
}

/// Échec de construction d'une couche
#[derive(Debug, Clone, Serialize)]
pub struct LayerFailure {
    pub rang: usize,
    pub finess: String,
    pub message: String,
}

/// Rapport complet de construction d'une carte
#[derive(Debug, Clone, Serialize)]
pub struct CarteReport {
    /// FINESS de l'établissement focal
    pub finess: String,
    /// Durée de construction
    pub duration_secs: f64,
    /// Statut global
    pub status: CarteStatus,

    /// Couches construites, focal en premier
    pub layers: Vec<LayerReport>,
    /// Couches abandonnées avec leur diagnostic
    pub failures: Vec<LayerFailure>,
}

impl CarteReport {
    /// Crée un rapport pour un établissement focal
    pub fn new(finess: &str) -> Self {
        Self {
            finess: finess.to_string(),
            duration_secs: 0.0,
            status: CarteStatus::Complete,
            layers: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Enregistre une couche construite
    pub fn record_layer(&mut self, rang: usize, nom: Option<String>, result: &ChoroplethResult) {
        self.layers.push(LayerReport {
            rang,
            finess: result.finess.clone(),
            nom,
            communes: result.values.len(),
            coverage_ratio: result.coverage.coverage_ratio,
            status: result.coverage.status,
            unmatched_postals: result.coverage.unmatched_postals.clone(),
            unmatched_insee: result.coverage.unmatched_insee.clone(),
            original_total: result.coverage.original_total,
            allocated_total: result.coverage.allocated_total,
            policy: result.policy,
        });
    }

    /// Enregistre une couche abandonnée
    pub fn record_failure(&mut self, rang: usize, finess: &str, message: impl Into<String>) {
        self.failures.push(LayerFailure {
            rang,
            finess: finess.to_string(),
            message: message.into(),
        });
    }

    /// Définit la durée de construction
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let all_ok = self
            .layers
            .iter()
            .all(|l| l.status == CoverageStatus::Ok);

        self.status = if self.layers.is_empty() {
            CarteStatus::Failed
        } else if self.failures.is_empty() && all_ok {
            CarteStatus::Complete
        } else {
            CarteStatus::Partial
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("CARTE REPORT - {}", self.finess);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- LAYERS ---");
        for layer in &self.layers {
            let label = layer.nom.as_deref().unwrap_or(layer.finess.as_str());
            println!(
                "  #{} {}: {} communes, coverage {:.1}% ({:?}, {})",
                layer.rang,
                label,
                layer.communes,
                layer.coverage_ratio * 100.0,
                layer.status,
                layer.policy
            );
            if !layer.unmatched_postals.is_empty() {
                println!(
                    "      unmatched postals (sample): {}",
                    layer.unmatched_postals.join(", ")
                );
            }
            if !layer.unmatched_insee.is_empty() {
                println!(
                    "      unmatched INSEE (sample): {}",
                    layer.unmatched_insee.join(", ")
                );
            }
        }

        if !self.failures.is_empty() {
            println!("\n--- FAILURES ({}) ---", self.failures.len());
            for f in &self.failures {
                println!("  #{} {}: {}", f.rang, f.finess, f.message);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} layers, {} failures, {:?}",
            self.finess,
            self.layers.len(),
            self.failures.len(),
            self.status
        )
    }
}
