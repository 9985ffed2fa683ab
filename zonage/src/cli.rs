//! Définition et implémentation des commandes CLI
//!
//! CLI simplifiée:
//! - `carte`: tables CSV + contours → couches choroplèthes JSON
//! - `inspecter`: diagnostic de la source de contours

use std::collections::HashSet;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Subcommand;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use communes::BoundaryCollection;

use crate::allocate::{AllocationPolicy, ChoroplethResult};
use crate::competitors::for_hospital;
use crate::config::Config;
use crate::engine::Engine;
use crate::mapping::AreaMapping;
use crate::records::{normalize_finess, noms_etablissements, RecruitmentRecord};
use crate::report::CarteReport;
use crate::tables;

#[derive(Subcommand)]
pub enum Commands {
    /// Build choropleth layers for a hospital and its top competitors
    Carte {
        /// 9-digit FINESS code of the focal hospital
        #[arg(short, long)]
        finess: String,

        /// Recruitment table (CSV: finessGeoDP;codeGeo;nb)
        #[arg(long)]
        recrutement: PathBuf,

        /// Competitors table (CSV: finessGeoDP;finessGeoDP_conc;TOT_conc;TOT_etb)
        #[arg(long)]
        concurrents: PathBuf,

        /// Communes reference table (CSV: codeInsee;codePostal)
        #[arg(long)]
        communes: PathBuf,

        /// Establishments directory (CSV: id;name) for display names
        #[arg(long)]
        etablissements: Option<PathBuf>,

        /// Boundary GeoJSON override path (plain or gzip)
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Allocation policy (default: config value, else even-split)
        #[arg(long, value_enum)]
        allocation: Option<AllocationPolicy>,

        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache version tag (bump to force a boundary reload)
        #[arg(long)]
        version: Option<String>,

        /// Output path for the JSON layers (stdout by default)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output path for the boundary GeoJSON filtered to used communes
        #[arg(long)]
        contours: Option<PathBuf>,

        /// Output path for the JSON report
        #[arg(long)]
        rapport: Option<PathBuf>,
    },

    /// Diagnose the boundary source (resolved path, INSEE key, size)
    Inspecter {
        /// Boundary GeoJSON override path
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Une couche du document JSON de sortie
#[derive(Serialize)]
struct LayerOutput<'a> {
    rang: usize,
    nom: Option<&'a str>,
    #[serde(flatten)]
    result: &'a ChoroplethResult,
}

/// Document JSON de sortie de la commande carte
#[derive(Serialize)]
struct CarteOutput<'a> {
    finess: &'a str,
    policy: AllocationPolicy,
    layers: Vec<LayerOutput<'a>>,
}

/// Exécute la commande carte
pub fn cmd_carte(
    finess: &str,
    recrutement: &Path,
    concurrents: &Path,
    communes_table: &Path,
    etablissements: Option<PathBuf>,
    geojson: Option<PathBuf>,
    allocation: Option<AllocationPolicy>,
    config_path: Option<PathBuf>,
    version: Option<String>,
    output: Option<PathBuf>,
    contours: Option<PathBuf>,
    rapport: Option<PathBuf>,
) -> Result<()> {
    let started = Instant::now();

    let finess = normalize_finess(finess);
    let config = load_config(config_path.as_deref())?;
    let policy = allocation.unwrap_or(config.allocation);
    let version = version.unwrap_or_else(|| config.cache_version.clone());

    if policy == AllocationPolicy::NoSplit {
        warn!("no_split double-counts patients across communes, validation use only");
    }

    println!("=== Carte {} ===", finess);
    println!("Recruitment: {}", recrutement.display());
    println!("Competitors: {}", concurrents.display());
    println!("Reference: {}", communes_table.display());
    println!("Policy: {}", policy);
    println!("Cache version: {}", version);

    // Charger les tables
    let recruitment = tables::load_recrutement(recrutement)?;
    let competitors_table = tables::load_concurrents(concurrents)?;
    let reference = tables::load_reference_communes(communes_table)?;
    let annuaire = match &etablissements {
        Some(path) => tables::load_etablissements(path)?,
        None => Vec::new(),
    };

    let mapping = AreaMapping::from_reference(&reference);
    println!("Relation: {} postal codes", mapping.len());

    // Résoudre les contours (mémorisé pour les appels suivants)
    let engine = Engine::new(config);
    let boundaries = engine.resolve_boundaries(geojson.as_deref(), &version)?;
    println!(
        "Boundaries: {} communes from {} (INSEE key: {})",
        boundaries.len(),
        boundaries.provenance().path.display(),
        boundaries.provenance().insee_key
    );

    // Classement des concurrents, puis une couche par établissement
    let ranked = engine.rank_competitors(&for_hospital(&competitors_table, &finess));
    info!(focal = %finess, competitors = ranked.len(), "Competitors ranked");

    let mut layer_ids: Vec<(usize, String)> = vec![(0, finess.clone())];
    layer_ids.extend(
        ranked
            .iter()
            .enumerate()
            .map(|(i, r)| (i + 1, r.finess_conc.clone())),
    );

    let ids: Vec<String> = layer_ids.iter().map(|(_, id)| id.clone()).collect();
    let noms = noms_etablissements(&ids, &annuaire);

    let outcomes: Vec<(usize, String, std::result::Result<Arc<ChoroplethResult>, String>)> =
        layer_ids
            .par_iter()
            .map(|(rang, id)| {
                let rows = records_for(&recruitment, id);
                let outcome = if rows.is_empty() {
                    Err("no recruitment rows".to_string())
                } else {
                    engine
                        .allocate(&rows, &mapping, policy, &boundaries)
                        .map_err(|e| e.to_string())
                };
                (*rang, id.clone(), outcome)
            })
            .collect();

    let mut report = CarteReport::new(&finess);
    let mut layers: Vec<(usize, String, Arc<ChoroplethResult>)> = Vec::new();

    for (rang, id, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                report.record_layer(rang, noms.get(&id).cloned(), &result);
                layers.push((rang, id, result));
            }
            Err(message) => {
                warn!(rang, finess = %id, %message, "Layer dropped");
                report.record_failure(rang, &id, message);
            }
        }
    }

    report.set_duration(started.elapsed());
    report.finalize();

    // Document de sortie
    let doc = CarteOutput {
        finess: &finess,
        policy,
        layers: layers
            .iter()
            .map(|(rang, id, result)| LayerOutput {
                rang: *rang,
                nom: noms.get(id).map(String::as_str),
                result: result.as_ref(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&doc)?;

    match &output {
        Some(path) => {
            std::fs::write(path, &json)
                .context(format!("Failed to write layers to {}", path.display()))?;
            println!("Layers: {}", path.display());
        }
        None => println!("{json}"),
    }

    // Contours filtrés aux communes effectivement utilisées
    if let Some(path) = &contours {
        let needed: HashSet<String> = layers
            .iter()
            .flat_map(|(_, _, r)| r.values.keys().cloned())
            .collect();
        let filtered = boundaries.filtered(&needed);
        write_contours(&filtered, path)?;
        println!("Contours: {} communes -> {}", filtered.len(), path.display());
    }

    if let Some(path) = &rapport {
        report.save_to_file(path)?;
        println!("Report: {}", path.display());
    }

    report.display();

    // La couche focale est la seule indispensable
    if !layers.iter().any(|(rang, _, _)| *rang == 0) {
        anyhow::bail!("Focal layer could not be built for {}", finess);
    }

    Ok(())
}

/// Exécute la commande inspecter
pub fn cmd_inspecter(geojson: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;

    match communes::load(geojson.as_deref(), config.geojson_path.as_deref()) {
        Ok(collection) => {
            let p = collection.provenance();
            println!("Path: {}", p.path.display());
            println!("Size: {:.1} MB", p.byte_size as f64 / (1024.0 * 1024.0));
            println!("Features: {}", collection.len());
            println!("INSEE key: {}", p.insee_key);
            println!("Compressed: {}", p.compressed);
            println!("Fingerprint: {}", p.fingerprint());
            Ok(())
        }
        Err(communes::CommunesError::NoSource { attempts }) => {
            println!("No usable boundary source. Paths tried:");
            for attempt in &attempts {
                println!("  - {attempt}");
            }
            anyhow::bail!("no usable boundary source ({} paths tried)", attempts.len());
        }
        Err(e) => Err(e.into()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

/// Lignes de recrutement d'un établissement
fn records_for(recruitment: &[RecruitmentRecord], finess: &str) -> Vec<RecruitmentRecord> {
    recruitment
        .iter()
        .filter(|r| r.finess == finess)
        .cloned()
        .collect()
}

/// Écrit une collection filtrée en GeoJSON
fn write_contours(collection: &BoundaryCollection, path: &Path) -> Result<()> {
    let insee_key = collection.provenance().insee_key.clone();

    let features: Vec<geojson::Feature> = collection
        .features()
        .iter()
        .map(|f| {
            let mut props = geojson::JsonObject::new();
            props.insert(
                insee_key.clone(),
                serde_json::Value::String(f.insee.clone()),
            );
            if let Some(nom) = &f.nom {
                props.insert("nom".to_string(), serde_json::Value::String(nom.clone()));
            }
            geojson::Feature {
                bbox: None,
                geometry: Some(f.geometry.clone()),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let file = std::fs::File::create(path)
        .context(format!("Failed to create file: {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &fc)?;

    Ok(())
}
