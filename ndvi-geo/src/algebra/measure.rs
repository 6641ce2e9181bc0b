use geo::{Area, Buffer, Geometry};
use rayon::prelude::*;

use crate::overlay;
use crate::repair::repair;
use crate::reproject::{reproject, Target};
use crate::types::{Feature, FeatureCollection, FieldKind, Value, WGS84_EPSG};
use crate::GeoError;

/// Arrondi à 7 décimales d'une surface en m² convertie en hectares
pub fn round_hectares(square_metres: f64) -> f64 {
    (square_metres / 10_000.0 * 1e7).round() / 1e7
}

/// Calcule la surface (ha) de chaque feature dans `column`
///
/// La mesure se fait en UTM local. Les features de l'hémisphère nord ne sont
/// pas converties et leur surface reste exprimée dans l'unité de leur CRS.
pub fn area(collection: &FeatureCollection, column: &str) -> FeatureCollection {
    let mut projected = reproject(collection, Target::LocalUtm);
    let index = projected.ensure_column(column, FieldKind::Number);

    for feature in &mut projected.features {
        feature.values[index] = Value::Number(round_hectares(feature.geometry.unsigned_area()));
    }

    repair(&projected)
}

/// Buffer de `distance` (unités du CRS de chaque feature), reprojeté en 4326
pub fn buffer(collection: &FeatureCollection, distance: f64) -> Result<FeatureCollection, GeoError> {
    let features: Vec<Feature> = collection
        .features
        .par_iter()
        .map(|feature| {
            let grown = if distance == 0.0 {
                overlay::normalize(&overlay::to_multi_polygon(&feature.geometry))?
            } else {
                overlay::guarded("buffer", || feature.geometry.buffer(distance))?
            };
            Ok(Feature::new(
                overlay::simplest(grown),
                feature.values.clone(),
                feature.epsg,
            ))
        })
        .collect::<Result<_, GeoError>>()?;

    let mut out = collection.empty_like();
    out.features = features;
    Ok(reproject(&out, Target::Epsg(WGS84_EPSG)))
}
