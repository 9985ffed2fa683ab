//! Classement des établissements concurrents
//!
//! L'ordre est entièrement déterministe: les couches de la carte et le
//! cache sont indexés par rang, un classement instable mélangerait les
//! couleurs d'une requête à l'autre.

use std::cmp::Ordering;

use crate::records::CompetitorRecord;

/// Nombre maximal de concurrents retournés
pub const TOP_N: usize = 5;

/// Classe les concurrents d'un établissement focal
///
/// Tri: volume concurrent décroissant, puis volume total décroissant,
/// puis FINESS croissant. Le résultat ne dépend pas de l'ordre d'entrée.
pub fn rank_competitors(records: &[CompetitorRecord]) -> Vec<CompetitorRecord> {
    let mut ranked: Vec<CompetitorRecord> = records.to_vec();
    ranked.sort_by(compare);
    ranked.truncate(TOP_N);
    ranked
}

/// Restreint une table de concurrence à un établissement focal
pub fn for_hospital(records: &[CompetitorRecord], finess: &str) -> Vec<CompetitorRecord> {
    records.iter().filter(|r| r.finess == finess).cloned().collect()
}

/// Ordre de classement: volume décroissant, total décroissant, FINESS croissant
pub fn compare(a: &CompetitorRecord, b: &CompetitorRecord) -> Ordering {
    b.nb_conc
        .cmp(&a.nb_conc)
        .then_with(|| b.total_conc.cmp(&a.total_conc))
        .then_with(|| a.finess_conc.cmp(&b.finess_conc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(finess_conc: &str, nb: i64, total: i64) -> CompetitorRecord {
        CompetitorRecord {
            finess: "750712184".to_string(),
            finess_conc: finess_conc.to_string(),
            nb_conc: nb,
            total_conc: total,
        }
    }

    #[test]
    fn test_rank_ties_broken_by_total_then_finess() {
        // Volumes [40, 40, 25, 10, 5], totaux [100, 90, 100, 50, 10]
        let records = vec![
            record("920000650", 10, 50),
            record("130785652", 40, 90),
            record("690781810", 40, 100),
            record("310781406", 25, 100),
            record("330781352", 5, 10),
        ];

        let ranked = rank_competitors(&records);
        let volumes: Vec<(i64, i64)> = ranked.iter().map(|r| (r.nb_conc, r.total_conc)).collect();

        assert_eq!(volumes, vec![(40, 100), (40, 90), (25, 100), (10, 50), (5, 10)]);
        // Les deux 40 se départagent par le volume total décroissant
        assert_eq!(ranked[0].finess_conc, "690781810");
        assert_eq!(ranked[1].finess_conc, "130785652");
    }

    #[test]
    fn test_rank_full_tie_falls_back_to_finess() {
        let records = vec![
            record("920000650", 40, 100),
            record("130785652", 40, 100),
            record("690781810", 40, 100),
        ];

        let ranked = rank_competitors(&records);
        let ids: Vec<&str> = ranked.iter().map(|r| r.finess_conc.as_str()).collect();

        assert_eq!(ids, vec!["130785652", "690781810", "920000650"]);
    }

    #[test]
    fn test_rank_independent_of_input_order() {
        let mut records = vec![
            record("920000650", 10, 50),
            record("130785652", 40, 90),
            record("690781810", 40, 100),
            record("310781406", 25, 100),
            record("330781352", 5, 10),
            record("060785011", 3, 7),
        ];

        let forward = rank_competitors(&records);
        records.reverse();
        let reversed = rank_competitors(&records);

        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_rank_truncates_to_five() {
        let records: Vec<CompetitorRecord> = (0..9)
            .map(|i| record(&format!("13078565{i}"), 100 - i, 100))
            .collect();

        let ranked = rank_competitors(&records);
        assert_eq!(ranked.len(), TOP_N);
        assert_eq!(ranked[0].nb_conc, 100);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank_competitors(&[]).is_empty());
    }

    #[test]
    fn test_for_hospital_filters() {
        let mut records = vec![record("130785652", 40, 90)];
        records.push(CompetitorRecord {
            finess: "690781810".to_string(),
            finess_conc: "310781406".to_string(),
            nb_conc: 12,
            total_conc: 30,
        });

        let focal = for_hospital(&records, "750712184");
        assert_eq!(focal.len(), 1);
        assert_eq!(focal[0].finess_conc, "130785652");
    }
}
