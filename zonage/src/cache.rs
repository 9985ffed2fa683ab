//! Cache mémoire des résultats coûteux
//!
//! Deux tables: les collections de contours (clé: chemin résolu + tag de
//! version fourni par l'opérateur) et les allocations (clé: empreinte de
//! contenu des entrées). Les valeurs sont publiées en `Arc` après calcul
//! complet: un lecteur ne voit jamais d'état partiel. Les échecs ne sont
//! jamais mémorisés, un incident transitoire se retente au prochain appel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info};

use communes::BoundaryCollection;

use crate::allocate::{AllocationPolicy, ChoroplethResult};

/// Clé d'une collection de contours mémorisée
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundaryKey {
    /// Chemin du fichier réellement chargé
    pub path: PathBuf,

    /// Tag de version fourni par l'appelant (rechargement forcé sans
    /// redémarrage)
    pub version: String,
}

struct CachedAllocation {
    /// Empreinte des entrées au moment du calcul, revérifiée à la lecture
    fingerprint: String,
    value: Arc<ChoroplethResult>,
}

/// Cache des contours et des allocations
#[derive(Default)]
pub struct ResultCache {
    boundaries: RwLock<HashMap<BoundaryKey, Arc<BoundaryCollection>>>,
    allocations: RwLock<HashMap<String, CachedAllocation>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cherche une collection mémorisée
    ///
    /// Une entrée dont la provenance ne correspond pas à sa clé est
    /// corrompue: elle est évincée immédiatement et l'appel est un miss.
    pub fn get_boundary(&self, path: &Path, version: &str) -> Option<Arc<BoundaryCollection>> {
        let key = BoundaryKey {
            path: path.to_path_buf(),
            version: version.to_string(),
        };

        let hit = {
            let table = self.boundaries.read().unwrap_or_else(PoisonError::into_inner);
            table.get(&key).cloned()
        };

        let collection = hit?;
        if collection.provenance().path != key.path {
            error!(
                key = %key.path.display(),
                stored = %collection.provenance().path.display(),
                "Cache corruption detected, evicting entry"
            );
            self.boundaries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            return None;
        }

        debug!(path = %key.path.display(), version = %key.version, "Boundary cache hit");
        Some(collection)
    }

    /// Mémorise une collection chargée avec succès
    ///
    /// La clé est dérivée de la provenance: le chemin mémorisé est
    /// toujours celui du fichier réellement lu.
    pub fn put_boundary(&self, version: &str, collection: Arc<BoundaryCollection>) {
        let key = BoundaryKey {
            path: collection.provenance().path.clone(),
            version: version.to_string(),
        };

        self.boundaries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, collection);
    }

    /// Cherche une allocation mémorisée par empreinte
    pub fn get_allocation(&self, fingerprint: &str) -> Option<Arc<ChoroplethResult>> {
        let hit = {
            let table = self.allocations.read().unwrap_or_else(PoisonError::into_inner);
            table.get(fingerprint).map(|entry| {
                (entry.fingerprint.clone(), Arc::clone(&entry.value))
            })
        };

        let (stored, value) = hit?;
        if stored != fingerprint {
            error!(key = fingerprint, "Cache corruption detected, evicting entry");
            self.allocations
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(fingerprint);
            return None;
        }

        debug!(key = fingerprint, "Allocation cache hit");
        Some(value)
    }

    /// Mémorise une allocation calculée avec succès
    pub fn put_allocation(&self, fingerprint: &str, value: Arc<ChoroplethResult>) {
        self.allocations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                fingerprint.to_string(),
                CachedAllocation {
                    fingerprint: fingerprint.to_string(),
                    value,
                },
            );
    }

    /// Vide tout le cache immédiatement
    pub fn reset(&self) {
        self.boundaries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.allocations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Result cache reset");
    }

    /// Nombre d'entrées mémorisées (contours, allocations)
    pub fn sizes(&self) -> (usize, usize) {
        let boundaries = self
            .boundaries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let allocations = self
            .allocations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        (boundaries, allocations)
    }
}

/// Empreinte de contenu d'une demande d'allocation
///
/// Couvre l'ensemble des FINESS (trié), la politique, la version de la
/// relation de référence et celle de la collection de contours: deux
/// demandes équivalentes partagent la même clé quel que soit l'ordre
/// des établissements.
pub fn allocation_fingerprint(
    finess: &[String],
    policy: AllocationPolicy,
    mapping_version: &str,
    boundary_version: &str,
) -> String {
    let mut sorted: Vec<&str> = finess.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = blake3::Hasher::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"|");
    }
    hasher.update(policy.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(mapping_version.as_bytes());
    hasher.update(b"|");
    hasher.update(boundary_version.as_bytes());

    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{classify, CoverageReport};
    use communes::{BoundaryFeature, Provenance};
    use std::collections::BTreeMap;

    fn collection(path: &str) -> Arc<BoundaryCollection> {
        Arc::new(BoundaryCollection::new(
            vec![BoundaryFeature {
                insee: "75101".to_string(),
                nom: None,
                geometry: geojson::Geometry::new(geojson::Value::Point(vec![0.0, 0.0])),
            }],
            Provenance {
                path: PathBuf::from(path),
                byte_size: 10,
                feature_count: 0,
                compressed: false,
                insee_key: "code".to_string(),
            },
        ))
    }

    fn result() -> Arc<ChoroplethResult> {
        Arc::new(ChoroplethResult {
            finess: "750712184".to_string(),
            values: BTreeMap::from([("75101".to_string(), 120.0)]),
            policy: AllocationPolicy::EvenSplit,
            coverage: CoverageReport {
                matched_count: 1,
                unmatched_count: 0,
                coverage_ratio: 1.0,
                status: classify(1.0),
                unmatched_postals: vec![],
                unmatched_insee: vec![],
                original_total: 120.0,
                allocated_total: 120.0,
                policy: AllocationPolicy::EvenSplit,
            },
        })
    }

    #[test]
    fn test_boundary_roundtrip() {
        let cache = ResultCache::new();
        let stored = collection("/data/communes.geojson");

        cache.put_boundary("v1", Arc::clone(&stored));

        let hit = cache
            .get_boundary(Path::new("/data/communes.geojson"), "v1")
            .unwrap();
        assert!(Arc::ptr_eq(&hit, &stored));
    }

    #[test]
    fn test_version_bump_invalidates() {
        let cache = ResultCache::new();
        cache.put_boundary("v1", collection("/data/communes.geojson"));

        assert!(cache
            .get_boundary(Path::new("/data/communes.geojson"), "v2")
            .is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache = ResultCache::new();
        cache.put_boundary("v1", collection("/data/communes.geojson"));
        cache.put_allocation("abc", result());
        assert_eq!(cache.sizes(), (1, 1));

        cache.reset();

        assert_eq!(cache.sizes(), (0, 0));
        assert!(cache
            .get_boundary(Path::new("/data/communes.geojson"), "v1")
            .is_none());
        assert!(cache.get_allocation("abc").is_none());
    }

    #[test]
    fn test_allocation_roundtrip() {
        let cache = ResultCache::new();
        let stored = result();

        cache.put_allocation("fp1", Arc::clone(&stored));

        let hit = cache.get_allocation("fp1").unwrap();
        assert!(Arc::ptr_eq(&hit, &stored));
        assert!(cache.get_allocation("fp2").is_none());
    }

    #[test]
    fn test_fingerprint_order_independent() {
        let a = allocation_fingerprint(
            &["750712184".to_string(), "690781810".to_string()],
            AllocationPolicy::EvenSplit,
            "m1",
            "b1",
        );
        let b = allocation_fingerprint(
            &["690781810".to_string(), "750712184".to_string()],
            AllocationPolicy::EvenSplit,
            "m1",
            "b1",
        );

        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_sensitive_to_inputs() {
        let base = allocation_fingerprint(
            &["750712184".to_string()],
            AllocationPolicy::EvenSplit,
            "m1",
            "b1",
        );

        let policy = allocation_fingerprint(
            &["750712184".to_string()],
            AllocationPolicy::NoSplit,
            "m1",
            "b1",
        );
        let mapping = allocation_fingerprint(
            &["750712184".to_string()],
            AllocationPolicy::EvenSplit,
            "m2",
            "b1",
        );
        let boundary = allocation_fingerprint(
            &["750712184".to_string()],
            AllocationPolicy::EvenSplit,
            "m1",
            "b2",
        );

        assert_ne!(base, policy);
        assert_ne!(base, mapping);
        assert_ne!(base, boundary);
    }
}
