//! Exports fichier

pub mod geojson;

pub use self::geojson::export_to_geojson;
