//! # zonage
//!
//! Agrégats de recrutement hospitalier par commune (choroplèthes).
//!
//! Le moteur joint les tables de recrutement (FINESS, code postal,
//! patients) aux contours communaux INSEE: relation postal ↔ communes
//! plusieurs-à-plusieurs avec répartition configurable, classement
//! déterministe des concurrents, validation de couverture avant tout
//! rendu, et cache mémoire par empreintes de contenu.
//!
//! ## Usage CLI
//!
//! ```bash
//! # Couches choroplèthes d'un établissement et de ses 5 concurrents
//! zonage carte --finess 750712184 \
//!     --recrutement data/recrutement.csv \
//!     --concurrents data/concurrents.csv \
//!     --communes data/communes_insee.csv
//!
//! # Diagnostic de la source de contours
//! zonage inspecter --geojson data/communes.geojson
//! ```

pub mod allocate;
pub mod cache;
pub mod cli;
pub mod competitors;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod records;
pub mod report;
pub mod tables;

pub use allocate::{allocate, AllocationPolicy, ChoroplethResult};
pub use cache::{allocation_fingerprint, ResultCache};
pub use competitors::{rank_competitors, TOP_N};
pub use config::Config;
pub use coverage::{CoverageReport, CoverageStatus};
pub use engine::Engine;
pub use error::ZonageError;
pub use mapping::{AreaMapping, ReferenceRow};
pub use records::{CompetitorRecord, Etablissement, RecruitmentRecord};
pub use report::{CarteReport, CarteStatus};
