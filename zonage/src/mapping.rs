//! Relation code postal ↔ code INSEE
//!
//! La relation est plusieurs-à-plusieurs: un code postal couvre souvent
//! plusieurs communes, une commune peut relever de plusieurs codes
//! postaux. La table de référence est chargée une fois, les poids de
//! répartition sont précalculés par code postal.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use communes::normalize_insee;

use crate::records::normalize_postal;

/// Une ligne de la table de référence communes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRow {
    /// Code INSEE de la commune
    pub insee: String,

    /// Code postal desservant la commune
    pub code_postal: String,
}

/// Relation postal → [(insee, poids)] avec empreinte de version
///
/// Pour un code postal relié à k communes, chaque entrée porte le poids
/// 1/k; la somme des poids d'un code postal vaut 1. Construite une fois,
/// jamais mutée ensuite.
#[derive(Debug, Clone)]
pub struct AreaMapping {
    relation: BTreeMap<String, Vec<(String, f64)>>,
    version: String,
}

impl AreaMapping {
    /// Construit la relation depuis la table de référence
    ///
    /// Les paires (postal, insee) dupliquées sont réduites avant le
    /// calcul des poids; les codes sont normalisés (zéros de tête,
    /// majuscules corses).
    pub fn from_reference(rows: &[ReferenceRow]) -> Self {
        let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();
        for row in rows {
            let postal = normalize_postal(&row.code_postal);
            let insee = normalize_insee(&row.insee);
            if postal.is_empty() || insee.is_empty() {
                continue;
            }
            pairs.insert((postal, insee));
        }

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (postal, insee) in pairs {
            grouped.entry(postal).or_default().push(insee);
        }

        let mut relation = BTreeMap::new();
        let mut hasher = blake3::Hasher::new();

        for (postal, codes) in grouped {
            let weight = 1.0 / codes.len() as f64;
            hasher.update(postal.as_bytes());
            for insee in &codes {
                hasher.update(insee.as_bytes());
            }
            relation.insert(
                postal,
                codes.into_iter().map(|insee| (insee, weight)).collect(),
            );
        }

        let version = hasher.finalize().to_hex().to_string();

        Self { relation, version }
    }

    /// Les communes desservies par un code postal, avec leur poids
    pub fn lookup(&self, postal: &str) -> Option<&[(String, f64)]> {
        self.relation.get(postal).map(Vec::as_slice)
    }

    /// Empreinte stable du contenu de la relation (clé de cache)
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Nombre de codes postaux couverts
    pub fn len(&self) -> usize {
        self.relation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(insee: &str, postal: &str) -> ReferenceRow {
        ReferenceRow {
            insee: insee.to_string(),
            code_postal: postal.to_string(),
        }
    }

    #[test]
    fn test_even_weights_sum_to_one() {
        let mapping = AreaMapping::from_reference(&[
            row("97701", "97133"),
            row("97702", "97133"),
            row("97703", "97133"),
        ]);

        let entries = mapping.lookup("97133").unwrap();
        assert_eq!(entries.len(), 3);
        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_pairs_deduplicated() {
        let mapping = AreaMapping::from_reference(&[
            row("75101", "75001"),
            row("75101", "75001"),
        ]);

        let entries = mapping.lookup("75001").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], ("75101".to_string(), 1.0));
    }

    #[test]
    fn test_codes_normalized() {
        let mapping = AreaMapping::from_reference(&[row("1001", "1000")]);

        let entries = mapping.lookup("01000").unwrap();
        assert_eq!(entries[0].0, "01001");
    }

    #[test]
    fn test_version_independent_of_row_order() {
        let a = AreaMapping::from_reference(&[
            row("75101", "75001"),
            row("69381", "69001"),
            row("2A004", "20000"),
        ]);
        let b = AreaMapping::from_reference(&[
            row("2A004", "20000"),
            row("69381", "69001"),
            row("75101", "75001"),
        ]);

        assert_eq!(a.version(), b.version());
    }

    #[test]
    fn test_version_changes_with_content() {
        let a = AreaMapping::from_reference(&[row("75101", "75001")]);
        let b = AreaMapping::from_reference(&[row("75102", "75001")]);

        assert_ne!(a.version(), b.version());
    }
}
