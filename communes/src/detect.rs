//! Détection de la propriété portant le code INSEE
//!
//! Les fichiers de contours n'utilisent pas tous la même clé (`code`,
//! `INSEE_COM`, `codgeo`...). La détection inspecte les propriétés des
//! features et retient la clé dont les valeurs ressemblent à des codes
//! INSEE pour au moins 90% des features.

use std::collections::BTreeSet;

use geojson::FeatureCollection;
use regex::Regex;
use serde_json::Value;

use crate::insee::is_valid_insee;
use crate::CommunesError;

/// Clés connues, testées en priorité dans cet ordre
const KNOWN_KEYS: &[&str] = &[
    "code",
    "INSEE_COM",
    "insee",
    "code_insee",
    "INSEE_CODE",
    "com_insee",
    "codgeo",
];

/// Couverture minimale: 90% des features doivent porter un code valide
const MIN_COVERAGE: f64 = 0.90;

/// Détecte la clé de propriété portant le code INSEE
///
/// Algorithme:
/// 1. Clés connues en priorité, validées par la couverture
/// 2. Clés candidates par motif (`INSEE*`, `code_insee`, `codgeo`)
/// 3. Dernier recours: toute clé dont les valeurs ont la bonne forme
///
/// Le résultat ne dépend pas de l'ordre des features: les clés sont
/// examinées dans un ordre trié et la couverture est calculée sur toute
/// la collection.
///
/// # Errors
///
/// `DetectionFailed` avec la liste des clés observées si aucune clé
/// n'atteint la couverture minimale.
pub fn detect_insee_property(collection: &FeatureCollection) -> Result<String, CommunesError> {
    let keys = observed_keys(collection);

    if collection.features.is_empty() {
        return Err(CommunesError::DetectionFailed { keys });
    }

    // 1. Clés connues
    for &key in KNOWN_KEYS {
        if keys.iter().any(|k| k == key) && coverage(collection, key) >= MIN_COVERAGE {
            return Ok(key.to_string());
        }
    }

    // 2. Motif INSEE (insensible à la casse)
    let pattern = Regex::new(r"(?i)^(INSEE.*|code(_)?insee|codgeo)$").expect("static regex");
    for key in keys.iter().filter(|k| pattern.is_match(k)) {
        if coverage(collection, key) >= MIN_COVERAGE {
            return Ok(key.clone());
        }
    }

    // 3. Forme des valeurs seule
    for key in &keys {
        if coverage(collection, key) >= MIN_COVERAGE {
            return Ok(key.clone());
        }
    }

    Err(CommunesError::DetectionFailed { keys })
}

/// Liste triée des clés de propriétés présentes dans la collection
pub fn observed_keys(collection: &FeatureCollection) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for feature in &collection.features {
        if let Some(props) = &feature.properties {
            for key in props.keys() {
                keys.insert(key.clone());
            }
        }
    }
    keys.into_iter().collect()
}

/// Fraction des features dont la valeur sous `key` est un code INSEE valide
fn coverage(collection: &FeatureCollection, key: &str) -> f64 {
    let total = collection.features.len();
    if total == 0 {
        return 0.0;
    }

    let valid = collection
        .features
        .iter()
        .filter_map(|f| f.properties.as_ref())
        .filter_map(|props| props.get(key))
        .filter(|v| value_as_code(v).map_or(false, |s| is_valid_insee(&s)))
        .count();

    valid as f64 / total as f64
}

/// Convertit une valeur de propriété en candidat code (chaîne ou nombre)
pub(crate) fn value_as_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::{Feature, Geometry};

    fn feature_with(props: &[(&str, Value)]) -> Feature {
        let mut map = serde_json::Map::new();
        for (k, v) in props {
            map.insert(k.to_string(), v.clone());
        }
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(vec![2.0, 48.0]))),
            id: None,
            properties: Some(map),
            foreign_members: None,
        }
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    #[test]
    fn test_detect_known_key() {
        let fc = collection(vec![
            feature_with(&[("code", Value::String("75101".into())), ("nom", Value::String("Paris 1er".into()))]),
            feature_with(&[("code", Value::String("75102".into())), ("nom", Value::String("Paris 2e".into()))]),
        ]);

        assert_eq!(detect_insee_property(&fc).unwrap(), "code");
    }

    #[test]
    fn test_detect_pattern_key() {
        let fc = collection(vec![
            feature_with(&[("insee_com", Value::String("01001".into()))]),
            feature_with(&[("insee_com", Value::String("2A004".into()))]),
        ]);

        assert_eq!(detect_insee_property(&fc).unwrap(), "insee_com");
    }

    #[test]
    fn test_detect_numeric_values() {
        // Certains fichiers portent le code en nombre (zéros de tête perdus)
        let fc = collection(vec![
            feature_with(&[("codgeo", Value::Number(1001.into()))]),
            feature_with(&[("codgeo", Value::Number(75101.into()))]),
        ]);

        assert_eq!(detect_insee_property(&fc).unwrap(), "codgeo");
    }

    #[test]
    fn test_detect_rejects_low_coverage() {
        // 1 valeur valide sur 2 → 50% < 90%
        let fc = collection(vec![
            feature_with(&[("code", Value::String("75101".into()))]),
            feature_with(&[("code", Value::String("not a code".into()))]),
        ]);

        let err = detect_insee_property(&fc).unwrap_err();
        match err {
            CommunesError::DetectionFailed { keys } => {
                assert_eq!(keys, vec!["code".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_detect_order_independent() {
        let a = feature_with(&[("INSEE_COM", Value::String("38001".into())), ("surface", Value::Number(12.into()))]);
        let b = feature_with(&[("INSEE_COM", Value::String("38002".into())), ("surface", Value::Number(34.into()))]);
        let c = feature_with(&[("INSEE_COM", Value::String("2B033".into())), ("surface", Value::Number(56.into()))]);

        let forward = collection(vec![a.clone(), b.clone(), c.clone()]);
        let reversed = collection(vec![c, b, a]);

        assert_eq!(
            detect_insee_property(&forward).unwrap(),
            detect_insee_property(&reversed).unwrap()
        );
    }

    #[test]
    fn test_detect_fallback_by_shape() {
        // Clé exotique, mais valeurs en forme de code INSEE
        let fc = collection(vec![
            feature_with(&[("ref_commune", Value::String("69123".into()))]),
            feature_with(&[("ref_commune", Value::String("69381".into()))]),
        ]);

        assert_eq!(detect_insee_property(&fc).unwrap(), "ref_commune");
    }

    #[test]
    fn test_detect_empty_collection() {
        let fc = collection(vec![]);
        assert!(matches!(
            detect_insee_property(&fc),
            Err(CommunesError::DetectionFailed { .. })
        ));
    }
}
