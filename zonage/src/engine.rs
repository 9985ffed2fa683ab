//! Façade du moteur d'agrégation
//!
//! Le moteur ne possède que sa configuration et son cache. Collections
//! de contours et relation de référence sont passées explicitement par
//! l'appelant: les tests substituent leurs fixtures sans toucher au
//! système de fichiers ni à un état global.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use communes::{source, BoundaryCollection};

use crate::allocate::{allocate, AllocationPolicy, ChoroplethResult};
use crate::cache::{allocation_fingerprint, ResultCache};
use crate::competitors::rank_competitors;
use crate::config::Config;
use crate::coverage::{validate, CoverageReport};
use crate::mapping::AreaMapping;
use crate::records::{CompetitorRecord, RecruitmentRecord};
use crate::ZonageError;

/// Moteur d'agrégation choroplèthe
pub struct Engine {
    config: Config,
    cache: ResultCache,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: ResultCache::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Résout et charge la collection de contours, avec mémoïsation
    ///
    /// La clé de cache est le chemin résolu plus le tag de version: un
    /// opérateur force un rechargement en changeant le tag, sans
    /// redémarrer le processus. Un échec n'est jamais mémorisé.
    ///
    /// # Errors
    ///
    /// Les erreurs de résolution et de détection remontent telles
    /// quelles, avec leur diagnostic complet.
    pub fn resolve_boundaries(
        &self,
        override_path: Option<&Path>,
        version: &str,
    ) -> Result<Arc<BoundaryCollection>, ZonageError> {
        let config_path = self.config.geojson_path.as_deref();

        if let Some(path) = source::probe(override_path, config_path) {
            if let Some(hit) = self.cache.get_boundary(&path, version) {
                return Ok(hit);
            }
        }

        let collection = Arc::new(communes::load(override_path, config_path)?);
        self.cache.put_boundary(version, Arc::clone(&collection));

        info!(
            path = %collection.provenance().path.display(),
            features = collection.len(),
            version = version,
            "Boundary collection loaded"
        );

        Ok(collection)
    }

    /// Alloue les volumes par commune, avec mémoïsation par empreinte
    ///
    /// La clé couvre l'ensemble des FINESS, la politique et les versions
    /// de la relation et des contours. Un résultat inutilisable est une
    /// erreur et n'entre jamais dans le cache.
    ///
    /// # Errors
    ///
    /// [`ZonageError::CoverageUnusable`] si la jointure est quasi vide.
    pub fn allocate(
        &self,
        records: &[RecruitmentRecord],
        mapping: &AreaMapping,
        policy: AllocationPolicy,
        boundaries: &BoundaryCollection,
    ) -> Result<Arc<ChoroplethResult>, ZonageError> {
        let finess: Vec<String> = records.iter().map(|r| r.finess.clone()).collect();
        let fingerprint = allocation_fingerprint(
            &finess,
            policy,
            mapping.version(),
            &boundaries.provenance().fingerprint(),
        );

        if let Some(hit) = self.cache.get_allocation(&fingerprint) {
            return Ok(hit);
        }

        let result = allocate(records, mapping, policy, boundaries);
        validate(&result.coverage)?;

        let result = Arc::new(result);
        self.cache.put_allocation(&fingerprint, Arc::clone(&result));

        Ok(result)
    }

    /// Classe les concurrents d'un établissement (≤ 5, ordre déterministe)
    pub fn rank_competitors(&self, records: &[CompetitorRecord]) -> Vec<CompetitorRecord> {
        rank_competitors(records)
    }

    /// Rapport de couverture d'un résultat
    pub fn validate_coverage<'a>(&self, result: &'a ChoroplethResult) -> &'a CoverageReport {
        &result.coverage
    }

    /// Vide immédiatement toutes les entrées mémorisées
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    /// Tailles du cache (contours, allocations), pour le diagnostic
    pub fn cache_sizes(&self) -> (usize, usize) {
        self.cache.sizes()
    }
}
