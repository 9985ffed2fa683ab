//! Répartition des patients par commune
//!
//! Les enregistrements de recrutement sont agrégés par code postal; la
//! relation postal ↔ INSEE redistribue les volumes sur les communes.
//! Les fractions sont conservées telles quelles: l'arrondi éventuel est
//! l'affaire du rendu, jamais de l'agrégation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use communes::BoundaryCollection;

use crate::coverage::{classify, ratio, CoverageReport, SAMPLE_LIMIT};
use crate::mapping::AreaMapping;
use crate::records::{normalize_postal, RecruitmentRecord};

/// Politique de répartition d'un volume sur plusieurs communes
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Partage équitable: chaque commune reçoit nb / k (défaut)
    #[default]
    EvenSplit,

    /// Volume entier sur chaque commune: double-compte, réservé au
    /// contrôle et au débogage, jamais en agrégation de production
    NoSplit,
}

impl std::fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AllocationPolicy::EvenSplit => "even_split",
            AllocationPolicy::NoSplit => "no_split",
        };
        f.write_str(label)
    }
}

/// Agrégat choroplèthe d'un établissement (ou d'un groupe)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoroplethResult {
    /// FINESS concernés, triés et joints par `+` s'ils sont plusieurs
    pub finess: String,

    /// Valeur allouée par code INSEE joint à la géométrie
    pub values: BTreeMap<String, f64>,

    /// Politique utilisée (toujours divulguée avec le résultat)
    pub policy: AllocationPolicy,

    pub coverage: CoverageReport,
}

/// Redistribue les volumes postaux sur les communes
///
/// - un code postal sans entrée de référence est compté non joint,
///   jamais rattaché à un code fabriqué;
/// - un code INSEE référencé mais absent des contours est exclu des
///   `values` mais conservé dans `allocated_total`;
/// - sous `even_split`, la somme allouée d'un code postal égale son
///   volume d'origine (tolérance flottante près).
pub fn allocate(
    records: &[RecruitmentRecord],
    mapping: &AreaMapping,
    policy: AllocationPolicy,
    boundaries: &BoundaryCollection,
) -> ChoroplethResult {
    let mut values: BTreeMap<String, f64> = BTreeMap::new();
    let mut matched_insee: BTreeSet<String> = BTreeSet::new();
    let mut unmatched_insee: BTreeSet<String> = BTreeSet::new();
    let mut unmatched_postals: BTreeSet<String> = BTreeSet::new();
    let mut finess_set: BTreeSet<String> = BTreeSet::new();

    let mut original_total = 0.0;
    let mut allocated_total = 0.0;

    for record in records {
        finess_set.insert(record.finess.clone());
        original_total += record.nb_patients;

        let postal = normalize_postal(&record.code_postal);
        let Some(entries) = mapping.lookup(&postal) else {
            unmatched_postals.insert(postal);
            continue;
        };

        for (insee, weight) in entries {
            let alloc = match policy {
                AllocationPolicy::EvenSplit => record.nb_patients * weight,
                AllocationPolicy::NoSplit => record.nb_patients,
            };
            allocated_total += alloc;

            if boundaries.contains(insee) {
                *values.entry(insee.clone()).or_insert(0.0) += alloc;
                matched_insee.insert(insee.clone());
            } else {
                unmatched_insee.insert(insee.clone());
            }
        }
    }

    let matched_count = matched_insee.len();
    let unmatched_count = unmatched_insee.len();
    let coverage_ratio = ratio(matched_count, unmatched_count);

    debug!(
        matched = matched_count,
        unmatched = unmatched_count,
        postals_unmapped = unmatched_postals.len(),
        %policy,
        "Allocation done"
    );

    let coverage = CoverageReport {
        matched_count,
        unmatched_count,
        coverage_ratio,
        status: classify(coverage_ratio),
        unmatched_postals: sample(&unmatched_postals),
        unmatched_insee: sample(&unmatched_insee),
        original_total,
        allocated_total,
        policy,
    };

    ChoroplethResult {
        finess: finess_set.into_iter().collect::<Vec<_>>().join("+"),
        values,
        policy,
        coverage,
    }
}

/// Échantillon borné et trié d'un ensemble de codes
fn sample(codes: &BTreeSet<String>) -> Vec<String> {
    codes.iter().take(SAMPLE_LIMIT).cloned().collect()
}
