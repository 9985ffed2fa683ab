//! Lecture et parsing des fichiers de contours (GeoJSON, gzip supporté)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use geojson::{FeatureCollection, GeoJson};
use tracing::{debug, info, warn};

use crate::detect::{detect_insee_property, value_as_code};
use crate::insee::normalize_insee;
use crate::source::{candidates, variants, AttemptReason, SourceAttempt, SourceCandidate};
use crate::types::{BoundaryCollection, BoundaryFeature, Provenance};
use crate::CommunesError;

/// Clés de propriétés portant le nom de la commune, par ordre de préférence
const NAME_KEYS: &[&str] = &["nom", "name", "libelle", "NOM_COM"];

/// Une FeatureCollection parsée avec les métadonnées de sa lecture
#[derive(Debug)]
pub struct ResolvedSource {
    pub collection: FeatureCollection,
    pub path: std::path::PathBuf,
    pub byte_size: u64,
    pub compressed: bool,
}

/// Résout la première source candidate valide
///
/// Chaque chemin est essayé dans l'ordre (variante `.gz` comprise). Un
/// candidat est retenu s'il existe et parse comme une FeatureCollection
/// non vide. Tous les échecs sont accumulés dans le diagnostic.
///
/// # Errors
///
/// `NoSource` avec la liste complète des chemins essayés et la raison de
/// chaque échec.
pub fn resolve(
    override_path: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<ResolvedSource, CommunesError> {
    let mut attempts: Vec<SourceAttempt> = Vec::new();

    for SourceCandidate { kind, path } in candidates(override_path, config_path) {
        for variant in variants(&path) {
            if !variant.exists() {
                attempts.push(SourceAttempt {
                    kind,
                    path: variant,
                    reason: AttemptReason::NotFound,
                });
                continue;
            }

            match read_source(&variant) {
                Ok((text, byte_size, compressed)) => match parse_collection(&text) {
                    Ok(collection) => {
                        info!(
                            path = %variant.display(),
                            features = collection.features.len(),
                            compressed = compressed,
                            "Boundary source resolved"
                        );
                        return Ok(ResolvedSource {
                            collection,
                            path: variant,
                            byte_size,
                            compressed,
                        });
                    }
                    Err(reason) => {
                        warn!(path = %variant.display(), %reason, "Boundary source rejected");
                        attempts.push(SourceAttempt {
                            kind,
                            path: variant,
                            reason: AttemptReason::Malformed(reason),
                        });
                    }
                },
                Err(e) => {
                    warn!(path = %variant.display(), error = %e, "Boundary source unreadable");
                    attempts.push(SourceAttempt {
                        kind,
                        path: variant,
                        reason: AttemptReason::NotReadable(e.to_string()),
                    });
                }
            }
        }
    }

    Err(CommunesError::NoSource { attempts })
}

/// Lit un fichier en mémoire, en décompressant la variante gzip
///
/// Le handle est relâché à la sortie du scope, y compris en cas d'échec
/// de lecture ou de parsing en aval.
fn read_source(path: &Path) -> std::io::Result<(String, u64, bool)> {
    let file = File::open(path)?;
    let byte_size = file.metadata()?.len();
    let compressed = path.extension().map_or(false, |ext| ext == "gz");

    let mut text = String::new();
    if compressed {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut text)?;
    }

    Ok((text, byte_size, compressed))
}

/// Parse le texte en FeatureCollection non vide
fn parse_collection(text: &str) -> Result<FeatureCollection, String> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| format!("invalid GeoJSON: {e}"))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        other => {
            return Err(format!(
                "expected a FeatureCollection, got {}",
                geojson_kind(&other)
            ))
        }
    };

    if collection.features.is_empty() {
        return Err("no features in collection".to_string());
    }

    Ok(collection)
}

fn geojson_kind(value: &GeoJson) -> &'static str {
    match value {
        GeoJson::Geometry(_) => "a bare geometry",
        GeoJson::Feature(_) => "a single feature",
        GeoJson::FeatureCollection(_) => "a FeatureCollection",
    }
}

/// Charge une collection depuis un chemin connu, sans liste de candidats
///
/// # Errors
///
/// - [`CommunesError::Unreadable`] si le fichier ne peut pas être lu
/// - [`CommunesError::Malformed`] si le contenu n'est pas une
///   FeatureCollection non vide
/// - [`CommunesError::DetectionFailed`] si aucune clé INSEE ne ressort
pub fn load_path(path: &Path) -> Result<BoundaryCollection, CommunesError> {
    let display = path.display().to_string();

    let (text, byte_size, compressed) =
        read_source(path).map_err(|e| CommunesError::unreadable(&display, e.to_string()))?;

    let collection =
        parse_collection(&text).map_err(|reason| CommunesError::malformed(&display, reason))?;

    build_collection(ResolvedSource {
        collection,
        path: path.to_path_buf(),
        byte_size,
        compressed,
    })
}

/// Construit une BoundaryCollection depuis une source résolue
///
/// La clé INSEE est détectée sur la collection; les features sans code
/// exploitable sont ignorées avec un compteur de diagnostic.
pub fn build_collection(source: ResolvedSource) -> Result<BoundaryCollection, CommunesError> {
    let insee_key = detect_insee_property(&source.collection)?;
    debug!(key = %insee_key, "INSEE property detected");

    let mut features = Vec::with_capacity(source.collection.features.len());
    let mut skipped = 0usize;

    for feature in source.collection.features {
        let Some(props) = &feature.properties else {
            skipped += 1;
            continue;
        };
        let Some(code) = props.get(&insee_key).and_then(value_as_code) else {
            skipped += 1;
            continue;
        };
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };

        let nom = NAME_KEYS
            .iter()
            .filter_map(|k| props.get(*k))
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .next();

        features.push(BoundaryFeature {
            insee: normalize_insee(&code),
            nom,
            geometry,
        });
    }

    if skipped > 0 {
        warn!(skipped, "Features without usable INSEE code or geometry");
    }

    let provenance = Provenance {
        path: source.path,
        byte_size: source.byte_size,
        feature_count: features.len(),
        compressed: source.compressed,
        insee_key,
    };

    Ok(BoundaryCollection::new(features, provenance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collection_rejects_non_collection() {
        let err = parse_collection(r#"{"type":"Point","coordinates":[1.0,2.0]}"#).unwrap_err();
        assert!(err.contains("bare geometry"), "got: {err}");
    }

    #[test]
    fn test_parse_collection_rejects_empty() {
        let err =
            parse_collection(r#"{"type":"FeatureCollection","features":[]}"#).unwrap_err();
        assert!(err.contains("no features"), "got: {err}");
    }

    #[test]
    fn test_parse_collection_rejects_invalid_json() {
        let err = parse_collection("{not json").unwrap_err();
        assert!(err.contains("invalid GeoJSON"), "got: {err}");
    }

    #[test]
    fn test_load_path_missing_is_unreadable() {
        let err = load_path(Path::new("/nonexistent/contours.geojson")).unwrap_err();
        assert!(matches!(err, CommunesError::Unreadable { .. }));
    }

    #[test]
    fn test_load_path_malformed() {
        let path = std::env::temp_dir().join(format!(
            "communes-loader-{}-malformed.geojson",
            std::process::id()
        ));
        std::fs::write(&path, "{not json").unwrap();

        let err = load_path(&path).unwrap_err();
        assert!(matches!(err, CommunesError::Malformed { .. }));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resolve_missing_everything() {
        let missing = Path::new("/nonexistent/communes-test.geojson");
        let err = resolve(Some(missing), None).unwrap_err();

        match err {
            CommunesError::NoSource { attempts } => {
                // Le chemin explicite et sa variante .gz sont tous deux tracés
                assert!(attempts.len() >= 2);
                assert!(attempts[0].path.ends_with("communes-test.geojson"));
                assert!(attempts[1].path.ends_with("communes-test.geojson.gz"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
