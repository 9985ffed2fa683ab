//! # communes
//!
//! Chargement des contours communaux français (GeoJSON) avec détection
//! automatique de la propriété portant le code INSEE.
//!
//! ## Features
//!
//! - Résolution de source ordonnée (override, config, env, défauts) avec
//!   diagnostic complet des chemins essayés
//! - Variante gzip (`.geojson.gz`) décompressée à la volée
//! - Détection de la clé INSEE validée par couverture (≥ 90%)
//! - Codes corses 2A/2B gérés à la normalisation et à la validation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use communes::load;
//!
//! let collection = load(None, None)?;
//! println!("{} communes ({})", collection.len(), collection.provenance().insee_key);
//! ```

pub mod detect;
pub mod error;
pub mod insee;
pub mod loader;
pub mod source;
pub mod types;

pub use detect::{detect_insee_property, observed_keys};
pub use error::CommunesError;
pub use loader::load_path;
pub use insee::{is_valid_insee, normalize_insee};
pub use source::{SourceAttempt, SourceKind, ENV_VAR};
pub use types::{BoundaryCollection, BoundaryFeature, Provenance};

use std::path::Path;

/// Charge la collection de contours depuis la première source valide.
///
/// Ordre de résolution: `override_path`, puis `config_path`, puis la
/// variable d'environnement [`ENV_VAR`], puis les chemins par défaut.
/// Pour chaque candidat la variante gzip du même nom est aussi essayée.
///
/// # Errors
///
/// - [`CommunesError::NoSource`] si aucun candidat n'existe et ne parse;
///   le diagnostic énumère chaque chemin essayé avec sa raison d'échec.
/// - [`CommunesError::DetectionFailed`] si la collection parse mais
///   qu'aucune propriété ne porte un code INSEE avec assez de couverture.
pub fn load(
    override_path: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<BoundaryCollection, CommunesError> {
    let source = loader::resolve(override_path, config_path)?;
    loader::build_collection(source)
}
