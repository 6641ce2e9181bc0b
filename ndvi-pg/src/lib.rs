//! # ndvi-pg
//!
//! Chargement des shapefiles d'intersection NDVI (cana-de-açúcar) dans
//! l'entrepôt PostgreSQL.
//!
//! ## Features
//!
//! - Classification des polygones (contrat, estágio, janela de colheita)
//! - Agrégation en deux phases (talhão puis entrepôt)
//! - Chargement idempotent par unité client × safra × janela (DELETE + COPY)
//! - Envoi des lignes brutes vers la première base
//! - Export GeoJSON standalone
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Traitement de toutes les unités J1/J2 de la safra 2025
//! ndvi-pg --safra 2025 --janela J1,J2 --jobs 4
//! ndvi-pg run --safra 2025 --janela J1 --client 2 --report report.json
//!
//! # Envoi brut d'une unité, puis traitement
//! ndvi-pg upload --client 2 --safra 2025 --janela J1 --replace
//!
//! # Export GeoJSON (sans base de données)
//! ndvi-pg to-geojson --path INTERSECT_NDVI_J1_2025.shp --safra 2025 --output out.geojson
//! ```

pub mod aggregate;
pub mod classify;
pub mod coerce;
pub mod config;
pub mod error;
pub mod export;
pub mod load;
pub mod locate;
pub mod pipeline;
pub mod raw;
pub mod report;

pub use config::PipelineConfig;
pub use error::{ClassifyError, WarehouseError};
pub use load::{create_pool, DatabaseConfig, MemoryWarehouse, PgWarehouse};
pub use report::{RunReport, RunStatus};
