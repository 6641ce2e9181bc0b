//! # ndvi-geo
//!
//! Lecture et normalisation géométrique des shapefiles d'intersection NDVI
//! (cana-de-açúcar) avant classification.
//!
//! ## Features
//!
//! - Lecture .shp/.dbf/.prj vers une table typée (`FeatureCollection`)
//! - Réparation des géométries invalides (toujours Polygon/MultiPolygon valides)
//! - Reprojection en Rust pur (WGS84, SIRGAS 2000, UTM), PROJ en option
//! - Algèbre : dissolve, intersect, différence symétrique, surface, buffer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ndvi_geo::{read_shapefile, repair, algebra};
//! use std::path::Path;
//!
//! let raw = read_shapefile(Path::new("INTERSECT_NDVI_J1_2025.shp"))?;
//! let clean = repair(&raw);
//! let farms = algebra::dissolve(&clean, Some(&["FAZENDA"]), Some("AREA_HA"))?;
//! println!("{} fazendas", farms.len());
//! ```

pub mod algebra;
pub mod error;
pub mod overlay;
pub mod prj;
pub mod reader;
pub mod repair;
pub mod reproject;
pub mod types;

pub use error::GeoError;
pub use reader::read_shapefile;
pub use repair::{repair, repair_with_stats, RepairStats};
pub use reproject::{reproject, Target};
pub use types::{Crs, Feature, FeatureCollection, Field, FieldKind, Schema, Value, WGS84_EPSG};
