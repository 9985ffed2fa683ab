//! Types de données pour le crate communes

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use geojson::Geometry;

/// Un contour communal avec son code INSEE et sa géométrie
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// Code INSEE normalisé (5 caractères, ex: "75101" ou "2A004")
    pub insee: String,

    /// Nom de la commune si présent dans la source
    pub nom: Option<String>,

    /// Géométrie GeoJSON (opaque pour le moteur de jointure)
    pub geometry: Geometry,
}

/// Provenance d'une collection chargée
#[derive(Debug, Clone)]
pub struct Provenance {
    /// Chemin du fichier réellement lu (variante .gz incluse)
    pub path: PathBuf,

    /// Taille du fichier sur disque en octets
    pub byte_size: u64,

    /// Nombre de features retenues
    pub feature_count: usize,

    /// Source décompressée à la volée (gzip)
    pub compressed: bool,

    /// Clé de propriété détectée portant le code INSEE
    pub insee_key: String,
}

impl Provenance {
    /// Empreinte stable du contenu chargé, pour les clés de cache
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.path.to_string_lossy().as_bytes());
        hasher.update(&self.byte_size.to_le_bytes());
        hasher.update(&(self.feature_count as u64).to_le_bytes());
        hasher.update(self.insee_key.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// Collection de contours communaux, immuable après chargement
///
/// Invariant: les codes INSEE sont uniques dans la collection
/// (premier arrivé conservé, doublons ignorés avec warning).
#[derive(Debug, Clone)]
pub struct BoundaryCollection {
    features: Vec<BoundaryFeature>,
    index: HashMap<String, usize>,
    provenance: Provenance,
}

impl BoundaryCollection {
    /// Construit une collection en garantissant l'unicité des codes
    pub fn new(features: Vec<BoundaryFeature>, provenance: Provenance) -> Self {
        let mut unique = Vec::with_capacity(features.len());
        let mut index = HashMap::with_capacity(features.len());

        for feature in features {
            if index.contains_key(&feature.insee) {
                tracing::warn!(insee = %feature.insee, "Duplicate INSEE code in boundary file, keeping first");
                continue;
            }
            index.insert(feature.insee.clone(), unique.len());
            unique.push(feature);
        }

        let mut provenance = provenance;
        provenance.feature_count = unique.len();

        Self {
            features: unique,
            index,
            provenance,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Vérifie la présence d'un code INSEE (déjà normalisé)
    pub fn contains(&self, insee: &str) -> bool {
        self.index.contains_key(insee)
    }

    /// Récupère le contour d'une commune
    pub fn get(&self, insee: &str) -> Option<&BoundaryFeature> {
        self.index.get(insee).map(|&i| &self.features[i])
    }

    pub fn features(&self) -> &[BoundaryFeature] {
        &self.features
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Itère sur les codes INSEE présents
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.insee.as_str())
    }

    /// Restreint la collection aux codes demandés (réduction de payload
    /// avant rendu). La provenance est conservée, le compte ajusté.
    pub fn filtered(&self, needed: &HashSet<String>) -> BoundaryCollection {
        let features: Vec<BoundaryFeature> = self
            .features
            .iter()
            .filter(|f| needed.contains(&f.insee))
            .cloned()
            .collect();

        BoundaryCollection::new(features, self.provenance.clone())
    }
}
