//! Types d'erreurs du moteur de zonage

use thiserror::Error;

/// Erreurs du moteur d'agrégation
#[derive(Debug, Error)]
pub enum ZonageError {
    /// Erreur de résolution ou de chargement des contours
    #[error(transparent)]
    Boundary(#[from] communes::CommunesError),

    /// Couverture de jointure trop faible pour produire une carte honnête
    #[error(
        "join coverage unusable: ratio {ratio:.3} ({matched} matched, {unmatched} unmatched codes)"
    )]
    CoverageUnusable {
        ratio: f64,
        matched: usize,
        unmatched: usize,
    },

    /// Entrée de cache incohérente avec sa clé (évincée immédiatement)
    #[error("cache entry corrupted for key {key}, entry evicted")]
    CacheCorruption { key: String },
}
