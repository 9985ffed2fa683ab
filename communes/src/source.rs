//! Résolution de la source des contours communaux
//!
//! L'ordre des candidats est fixe: chemin explicite, chemin configuré,
//! variable d'environnement, puis chemins relatifs par défaut. Pour chaque
//! candidat la variante gzip du même nom de fichier est aussi essayée.

use std::fmt;
use std::path::{Path, PathBuf};

/// Variable d'environnement portant un chemin de contours
pub const ENV_VAR: &str = "COMMUNES_GEOJSON_PATH";

/// Chemins relatifs essayés en dernier recours
pub const DEFAULT_PATHS: &[&str] = &["data/communes.geojson", "communes/data/communes.geojson"];

/// Origine d'un chemin candidat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Chemin passé explicitement par l'appelant
    Override,
    /// Chemin issu de la configuration
    Config,
    /// Chemin issu de la variable d'environnement
    Env,
    /// Chemin relatif par défaut
    Default,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceKind::Override => "override",
            SourceKind::Config => "config",
            SourceKind::Env => "env",
            SourceKind::Default => "default",
        };
        f.write_str(label)
    }
}

/// Un chemin candidat avec son origine
#[derive(Debug, Clone)]
pub struct SourceCandidate {
    pub kind: SourceKind,
    pub path: PathBuf,
}

/// Raison de l'échec d'un chemin essayé
#[derive(Debug, Clone)]
pub enum AttemptReason {
    /// Le fichier n'existe pas
    NotFound,
    /// Le fichier existe mais n'a pas pu être lu
    NotReadable(String),
    /// Le contenu n'est pas une FeatureCollection exploitable
    Malformed(String),
}

impl fmt::Display for AttemptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptReason::NotFound => f.write_str("not found"),
            AttemptReason::NotReadable(e) => write!(f, "not readable: {e}"),
            AttemptReason::Malformed(e) => write!(f, "malformed: {e}"),
        }
    }
}

/// Un chemin essayé sans succès, pour le diagnostic opérateur
#[derive(Debug, Clone)]
pub struct SourceAttempt {
    pub kind: SourceKind,
    pub path: PathBuf,
    pub reason: AttemptReason,
}

impl fmt::Display for SourceAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.path.display(), self.kind, self.reason)
    }
}

/// Construit la liste ordonnée des chemins candidats
///
/// L'environnement est lu à chaque appel: un opérateur peut corriger
/// `COMMUNES_GEOJSON_PATH` sans redémarrer le processus.
pub fn candidates(
    override_path: Option<&Path>,
    config_path: Option<&Path>,
) -> Vec<SourceCandidate> {
    let mut list = Vec::new();

    if let Some(path) = override_path {
        list.push(SourceCandidate {
            kind: SourceKind::Override,
            path: path.to_path_buf(),
        });
    }

    if let Some(path) = config_path {
        list.push(SourceCandidate {
            kind: SourceKind::Config,
            path: path.to_path_buf(),
        });
    }

    if let Ok(value) = std::env::var(ENV_VAR) {
        if !value.trim().is_empty() {
            list.push(SourceCandidate {
                kind: SourceKind::Env,
                path: PathBuf::from(value.trim()),
            });
        }
    }

    for path in DEFAULT_PATHS {
        list.push(SourceCandidate {
            kind: SourceKind::Default,
            path: PathBuf::from(path),
        });
    }

    list
}

/// Variantes d'un chemin candidat: le chemin lui-même puis, s'il ne se
/// termine pas déjà par `.gz`, la variante compressée du même nom.
pub fn variants(path: &Path) -> Vec<PathBuf> {
    if path.extension().map_or(false, |ext| ext == "gz") {
        return vec![path.to_path_buf()];
    }

    let mut gz = path.as_os_str().to_os_string();
    gz.push(".gz");
    vec![path.to_path_buf(), PathBuf::from(gz)]
}

/// Premier chemin candidat existant, sans lecture du contenu
///
/// Sert de clé de cache avant résolution complète. Un fichier présent
/// mais invalide n'obtient jamais d'entrée de cache (les échecs ne sont
/// pas mémorisés): un hit sur ce chemin est donc toujours sûr.
pub fn probe(override_path: Option<&Path>, config_path: Option<&Path>) -> Option<PathBuf> {
    candidates(override_path, config_path)
        .iter()
        .flat_map(|c| variants(&c.path))
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_order() {
        let override_path = PathBuf::from("/tmp/override.geojson");
        let config_path = PathBuf::from("/tmp/config.geojson");

        let list = candidates(Some(&override_path), Some(&config_path));

        assert_eq!(list[0].kind, SourceKind::Override);
        assert_eq!(list[1].kind, SourceKind::Config);
        // Les chemins par défaut ferment toujours la liste
        let defaults: Vec<_> = list
            .iter()
            .filter(|c| c.kind == SourceKind::Default)
            .collect();
        assert_eq!(defaults.len(), DEFAULT_PATHS.len());
        assert_eq!(list.last().unwrap().kind, SourceKind::Default);
    }

    #[test]
    fn test_candidates_without_overrides() {
        let list = candidates(None, None);
        assert!(list.iter().all(|c| c.kind != SourceKind::Override));
        assert!(list.iter().any(|c| c.kind == SourceKind::Default));
    }

    #[test]
    fn test_variants_plain_path() {
        let v = variants(Path::new("data/communes.geojson"));
        assert_eq!(v.len(), 2);
        assert_eq!(v[0], PathBuf::from("data/communes.geojson"));
        assert_eq!(v[1], PathBuf::from("data/communes.geojson.gz"));
    }

    #[test]
    fn test_variants_gz_path() {
        let v = variants(Path::new("data/communes.geojson.gz"));
        assert_eq!(v, vec![PathBuf::from("data/communes.geojson.gz")]);
    }

    #[test]
    fn test_attempt_display() {
        let attempt = SourceAttempt {
            kind: SourceKind::Env,
            path: PathBuf::from("/nope.geojson"),
            reason: AttemptReason::NotFound,
        };
        assert_eq!(attempt.to_string(), "/nope.geojson [env]: not found");
    }
}
