//! Validation de la couverture de jointure
//!
//! Un résultat dont presque aucun code ne rejoint la géométrie produirait
//! une carte quasi vide et trompeuse: il est bloqué plutôt que retourné.

use serde::{Deserialize, Serialize};

use crate::allocate::AllocationPolicy;
use crate::ZonageError;

/// Couverture minimale pour un résultat sain
pub const OK_THRESHOLD: f64 = 0.90;

/// Sous ce seuil le résultat est inutilisable
pub const UNUSABLE_THRESHOLD: f64 = 0.05;

/// Taille maximale des échantillons de codes non joints
pub const SAMPLE_LIMIT: usize = 10;

/// Classement d'une couverture de jointure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageStatus {
    /// Jointure saine, résultat rendu tel quel
    Ok,
    /// Jointure partielle, rendu possible avec avertissement visible
    Degraded,
    /// Jointure quasi vide, résultat supprimé
    Unusable,
}

/// Rapport de couverture d'une jointure codes ↔ géométrie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Codes INSEE dérivés retrouvés dans la collection de contours
    pub matched_count: usize,

    /// Codes INSEE dérivés absents de la collection
    pub unmatched_count: usize,

    /// matched / (matched + unmatched), 0 si aucune donnée
    pub coverage_ratio: f64,

    pub status: CoverageStatus,

    /// Échantillon (≤ 10) de codes postaux sans entrée de référence
    pub unmatched_postals: Vec<String>,

    /// Échantillon (≤ 10) de codes INSEE sans contour
    pub unmatched_insee: Vec<String>,

    /// Total de patients des enregistrements d'entrée
    pub original_total: f64,

    /// Total alloué (codes joints ou non), pour le contrôle de conservation
    pub allocated_total: f64,

    /// Politique d'allocation utilisée pour produire le résultat
    pub policy: AllocationPolicy,
}

/// Classe un ratio de couverture
///
/// Les bornes sont exactes: 0.90 est sain, 0.05 est dégradé.
pub fn classify(ratio: f64) -> CoverageStatus {
    if ratio >= OK_THRESHOLD {
        CoverageStatus::Ok
    } else if ratio >= UNUSABLE_THRESHOLD {
        CoverageStatus::Degraded
    } else {
        CoverageStatus::Unusable
    }
}

/// Calcule le ratio matched / (matched + unmatched)
///
/// Une jointure vide (0 + 0) vaut 0: inutilisable plutôt que faussement
/// parfaite.
pub fn ratio(matched: usize, unmatched: usize) -> f64 {
    let total = matched + unmatched;
    if total == 0 {
        return 0.0;
    }
    matched as f64 / total as f64
}

/// Rejette les rapports inutilisables
///
/// # Errors
///
/// `CoverageUnusable` si le statut est [`CoverageStatus::Unusable`]; les
/// statuts sain et dégradé passent (le dégradé porte son avertissement
/// dans le rapport).
pub fn validate(report: &CoverageReport) -> Result<(), ZonageError> {
    if report.status == CoverageStatus::Unusable {
        return Err(ZonageError::CoverageUnusable {
            ratio: report.coverage_ratio,
            matched: report.matched_count,
            unmatched: report.unmatched_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exact_boundaries() {
        assert_eq!(classify(1.0), CoverageStatus::Ok);
        assert_eq!(classify(0.90), CoverageStatus::Ok);
        assert_eq!(classify(0.899), CoverageStatus::Degraded);
        assert_eq!(classify(0.05), CoverageStatus::Degraded);
        assert_eq!(classify(0.04), CoverageStatus::Unusable);
        assert_eq!(classify(0.0), CoverageStatus::Unusable);
    }

    #[test]
    fn test_ratio_90_percent_is_ok() {
        // 90 codes joints sur 100 → exactement 0.90 → sain
        let r = ratio(90, 10);
        assert!((r - 0.90).abs() < 1e-12);
        assert_eq!(classify(r), CoverageStatus::Ok);
    }

    #[test]
    fn test_ratio_empty_join() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(classify(ratio(0, 0)), CoverageStatus::Unusable);
    }

    #[test]
    fn test_validate_blocks_unusable() {
        let report = CoverageReport {
            matched_count: 1,
            unmatched_count: 24,
            coverage_ratio: 0.04,
            status: classify(0.04),
            unmatched_postals: vec![],
            unmatched_insee: vec![],
            original_total: 100.0,
            allocated_total: 4.0,
            policy: AllocationPolicy::EvenSplit,
        };

        let err = validate(&report).unwrap_err();
        assert!(matches!(err, ZonageError::CoverageUnusable { .. }));
    }

    #[test]
    fn test_validate_accepts_degraded() {
        let report = CoverageReport {
            matched_count: 50,
            unmatched_count: 50,
            coverage_ratio: 0.5,
            status: classify(0.5),
            unmatched_postals: vec!["99999".to_string()],
            unmatched_insee: vec![],
            original_total: 10.0,
            allocated_total: 5.0,
            policy: AllocationPolicy::EvenSplit,
        };

        assert!(validate(&report).is_ok());
    }
}
