//! Configuration du moteur

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::allocate::AllocationPolicy;

/// Configuration principale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chemin configuré du GeoJSON des contours communaux
    #[serde(default)]
    pub geojson_path: Option<PathBuf>,

    /// Politique d'allocation par défaut (even_split en production)
    #[serde(default)]
    pub allocation: AllocationPolicy,

    /// Tag de version du cache: changer le tag force un rechargement
    /// sans redémarrage du processus
    #[serde(default = "default_cache_version")]
    pub cache_version: String,
}

fn default_cache_version() -> String {
    "v1".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geojson_path: None,
            allocation: AllocationPolicy::default(),
            cache_version: default_cache_version(),
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }
}
