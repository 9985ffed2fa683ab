//! Enregistrements tabulaires consommés par le moteur
//!
//! Ces lignes sont produites par l'application environnante (tables de
//! recrutement, de concurrence, annuaire des établissements) et lues
//! sans mutation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Longueur maximale d'un nom d'établissement affiché
const MAX_NAME_LEN: usize = 40;

/// Une ligne de recrutement: patients d'une zone postale vus par un établissement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecruitmentRecord {
    /// FINESS géographique de l'établissement (9 caractères)
    pub finess: String,

    /// Code postal d'origine des patients (5 caractères)
    pub code_postal: String,

    /// Nombre de patients (jamais négatif)
    pub nb_patients: f64,

    /// Année ou période si la table la porte
    pub periode: Option<String>,
}

/// Une ligne de concurrence entre deux établissements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    /// FINESS de l'établissement focal
    pub finess: String,

    /// FINESS du concurrent
    pub finess_conc: String,

    /// Volume de patients capté par le concurrent sur la zone
    pub nb_conc: i64,

    /// Volume total du concurrent (départage des égalités)
    pub total_conc: i64,
}

/// Identité d'un établissement pour l'affichage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Etablissement {
    pub finess: String,
    pub nom: String,
}

/// Normalise un FINESS: trim, guillemets retirés, complété à 9 chiffres
pub fn normalize_finess(raw: &str) -> String {
    let s = raw.trim().trim_matches('"').trim();
    if !s.is_empty() && s.len() <= 9 && s.chars().all(|c| c.is_ascii_digit()) {
        return format!("{:0>9}", s);
    }
    s.to_string()
}

/// Normalise un code postal: trim, complété à 5 chiffres
pub fn normalize_postal(raw: &str) -> String {
    let s = raw.trim().trim_matches('"').trim();
    if !s.is_empty() && s.len() <= 5 && s.chars().all(|c| c.is_ascii_digit()) {
        return format!("{:0>5}", s);
    }
    s.to_string()
}

/// Résout les noms d'affichage d'une liste de FINESS
///
/// Les établissements absents de l'annuaire reçoivent un libellé de
/// repli; les noms trop longs sont tronqués pour l'affichage.
pub fn noms_etablissements(
    finess_list: &[String],
    annuaire: &[Etablissement],
) -> HashMap<String, String> {
    let by_finess: HashMap<&str, &str> = annuaire
        .iter()
        .map(|e| (e.finess.as_str(), e.nom.as_str()))
        .collect();

    finess_list
        .iter()
        .map(|finess| {
            let nom = match by_finess.get(finess.as_str()) {
                Some(nom) => truncate_name(nom),
                None => format!("Etablissement {finess}"),
            };
            (finess.clone(), nom)
        })
        .collect()
}

fn truncate_name(nom: &str) -> String {
    if nom.chars().count() <= MAX_NAME_LEN {
        return nom.to_string();
    }
    let cut: String = nom.chars().take(MAX_NAME_LEN - 3).collect();
    format!("{cut}...")
}
