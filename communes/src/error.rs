//! Types d'erreurs pour le crate communes

use thiserror::Error;

use crate::source::SourceAttempt;

/// Erreurs pouvant survenir lors du chargement des contours communaux
#[derive(Debug, Error)]
pub enum CommunesError {
    /// Aucune source candidate n'a produit une collection valide
    #[error("no usable boundary source ({})", format_attempts(.attempts))]
    NoSource {
        /// Chaque chemin essayé, dans l'ordre, avec la raison de l'échec
        attempts: Vec<SourceAttempt>,
    },

    /// Fichier présent mais illisible
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// Contenu présent mais pas une FeatureCollection exploitable
    #[error("malformed boundary data in {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// Aucune propriété ne porte un code INSEE avec une couverture suffisante
    #[error("INSEE property detection failed, keys seen: [{}]", .keys.join(", "))]
    DetectionFailed {
        /// Clés de propriétés observées dans la collection (pour diagnostic)
        keys: Vec<String>,
    },
}

fn format_attempts(attempts: &[SourceAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidate paths".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CommunesError {
    /// Crée une erreur de source illisible
    pub fn unreadable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de données malformées
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
