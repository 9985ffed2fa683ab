//! Chargement des tables CSV (recrutement, concurrence, communes)
//!
//! Les tables sources sont séparées par point-virgule, parfois avec
//! en-têtes et valeurs entre guillemets, décimales à virgule, et un
//! encodage variable (UTF-8 ou cp1252 hérité des exports Windows).

use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::WINDOWS_1252;
use tracing::{debug, warn};

use crate::mapping::ReferenceRow;
use crate::records::{
    normalize_finess, normalize_postal, CompetitorRecord, Etablissement, RecruitmentRecord,
};

/// Lit un fichier texte en tolérant l'encodage cp1252
fn read_decoded(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .context(format!("Failed to read table: {}", path.display()))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            debug!(path = %path.display(), "Not valid UTF-8, decoding as cp1252");
            let (text, _, _) = WINDOWS_1252.decode(e.as_bytes());
            Ok(text.into_owned())
        }
    }
}

/// Position d'une colonne par ses noms possibles (guillemets tolérés)
fn index_of(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let clean = h.trim().trim_matches('"');
        aliases.iter().any(|a| a.eq_ignore_ascii_case(clean))
    })
}

/// Valeur d'une cellule, guillemets et espaces retirés
fn cell<'a>(record: &'a StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("").trim().trim_matches('"').trim()
}

/// Parse un nombre avec décimale à virgule; invalide vaut 0
fn parse_number(raw: &str) -> f64 {
    let cleaned = raw.replace(',', ".").replace('%', "");
    cleaned.trim().parse::<f64>().unwrap_or(0.0)
}

/// Charge la table de recrutement (finessGeoDP;codeGeo;nb;...)
pub fn load_recrutement(path: &Path) -> Result<Vec<RecruitmentRecord>> {
    let text = read_decoded(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let Some(finess_idx) = index_of(&headers, &["finessGeoDP", "finess"]) else {
        bail!("Missing FINESS column in {}", path.display());
    };
    let Some(postal_idx) = index_of(&headers, &["codeGeo", "postal", "code_postal"]) else {
        bail!("Missing postal column in {}", path.display());
    };
    let Some(nb_idx) = index_of(&headers, &["nb", "nb_patients"]) else {
        bail!("Missing patient count column in {}", path.display());
    };
    let periode_idx = index_of(&headers, &["annee", "year", "periode"]);

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record?;
        let finess = normalize_finess(cell(&record, finess_idx));
        let postal = normalize_postal(cell(&record, postal_idx));
        if finess.is_empty() || postal.is_empty() {
            skipped += 1;
            continue;
        }

        // Les volumes négatifs sont des artefacts d'export
        let nb_patients = parse_number(cell(&record, nb_idx)).max(0.0);
        let periode = periode_idx
            .map(|i| cell(&record, i).to_string())
            .filter(|s| !s.is_empty());

        rows.push(RecruitmentRecord {
            finess,
            code_postal: postal,
            nb_patients,
            periode,
        });
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "Recruitment rows without FINESS or postal code");
    }
    debug!(rows = rows.len(), path = %path.display(), "Recruitment table loaded");

    Ok(rows)
}

/// Charge la table de concurrence (finessGeoDP;finessGeoDP_conc;TOT_conc;TOT_etb)
pub fn load_concurrents(path: &Path) -> Result<Vec<CompetitorRecord>> {
    let text = read_decoded(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let Some(finess_idx) = index_of(&headers, &["finessGeoDP", "hospital_id"]) else {
        bail!("Missing focal FINESS column in {}", path.display());
    };
    let Some(conc_idx) = index_of(&headers, &["finessGeoDP_conc", "competitor_id"]) else {
        bail!("Missing competitor FINESS column in {}", path.display());
    };
    let Some(nb_idx) = index_of(&headers, &["TOT_conc", "competitor_patients"]) else {
        bail!("Missing competitor volume column in {}", path.display());
    };
    let Some(total_idx) = index_of(&headers, &["TOT_etb", "hospital_patients"]) else {
        bail!("Missing total volume column in {}", path.display());
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let finess = normalize_finess(cell(&record, finess_idx));
        let finess_conc = normalize_finess(cell(&record, conc_idx));
        if finess.is_empty() || finess_conc.is_empty() {
            continue;
        }

        rows.push(CompetitorRecord {
            finess,
            finess_conc,
            nb_conc: parse_number(cell(&record, nb_idx)) as i64,
            total_conc: parse_number(cell(&record, total_idx)) as i64,
        });
    }

    debug!(rows = rows.len(), path = %path.display(), "Competitors table loaded");

    Ok(rows)
}

/// Charge la table de référence communes (codeInsee;codePostal;...)
pub fn load_reference_communes(path: &Path) -> Result<Vec<ReferenceRow>> {
    let text = read_decoded(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let Some(insee_idx) = index_of(&headers, &["codeInsee", "insee"]) else {
        bail!("Missing INSEE column in {}", path.display());
    };
    let Some(postal_idx) = index_of(&headers, &["codePostal", "postal", "code_postal"]) else {
        bail!("Missing postal column in {}", path.display());
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let insee = cell(&record, insee_idx).to_string();
        let code_postal = cell(&record, postal_idx).to_string();
        if insee.is_empty() || code_postal.is_empty() {
            continue;
        }
        rows.push(ReferenceRow { insee, code_postal });
    }

    debug!(rows = rows.len(), path = %path.display(), "Communes reference loaded");

    Ok(rows)
}

/// Charge l'annuaire des établissements (id;name)
pub fn load_etablissements(path: &Path) -> Result<Vec<Etablissement>> {
    let text = read_decoded(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let Some(finess_idx) = index_of(&headers, &["id", "finess", "finessGeoDP"]) else {
        bail!("Missing id column in {}", path.display());
    };
    let Some(nom_idx) = index_of(&headers, &["name", "nom", "raison_sociale"]) else {
        bail!("Missing name column in {}", path.display());
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let finess = normalize_finess(cell(&record, finess_idx));
        let nom = cell(&record, nom_idx).to_string();
        if finess.is_empty() {
            continue;
        }
        rows.push(Etablissement { finess, nom });
    }

    Ok(rows)
}
