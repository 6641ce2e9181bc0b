//! Reprojection des collections
//!
//! Deux cibles :
//! - `Target::Epsg(code)` : transformation explicite. En cas d'échec, les
//!   coordonnées sont conservées et seule l'étiquette EPSG change (`warn!`).
//! - `Target::LocalUtm` : zone UTM du centroïde de chaque feature. Seules les
//!   features de l'hémisphère sud sont converties (EPSG 327xx), celles du
//!   nord restent inchangées, la collection peut donc devenir mixte.
//!
//! Transformations en Rust pur pour les systèmes rencontrés au Brésil
//! (WGS84, SIRGAS 2000, UTM WGS84/SIRGAS, Web Mercator), PROJ en fallback
//! avec le feature `reproject`.

mod ellipsoid;
mod mercator;
#[cfg(feature = "reproject")]
mod proj_backend;
mod utm;

use std::collections::HashMap;

use geo::{Centroid, Coord, Geometry, MapCoords};
use tracing::warn;

pub use ellipsoid::Ellipsoid;
pub use utm::{zone_number, UtmZone};

use crate::types::{Crs, Feature, FeatureCollection};
use crate::GeoError;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Cible d'une reprojection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Epsg(u32),
    LocalUtm,
}

/// Système de coordonnées supporté en Rust pur
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteCrs {
    /// WGS84 (4326) ou SIRGAS 2000 (4674), datums confondus
    Geographic,
    Utm(UtmZone),
    WebMercator,
}

impl LiteCrs {
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        let utm = |zone, south, ellipsoid| {
            Some(Self::Utm(UtmZone {
                zone,
                south,
                ellipsoid,
            }))
        };
        match epsg {
            4326 | 4674 => Some(Self::Geographic),
            3857 => Some(Self::WebMercator),
            32601..=32660 => utm(epsg - 32600, false, Ellipsoid::WGS84),
            32701..=32760 => utm(epsg - 32700, true, Ellipsoid::WGS84),
            31971..=31976 => utm(epsg - 31954, false, Ellipsoid::GRS80),
            31977..=31985 => utm(epsg - 31960, true, Ellipsoid::GRS80),
            _ => None,
        }
    }

    fn unproject(self, c: Coord) -> Result<Geographic, GeoError> {
        match self {
            Self::Geographic => Ok(Geographic::from_degrees(c.x, c.y)),
            Self::Utm(zone) => utm::utm_to_geographic(c.x, c.y, zone),
            Self::WebMercator => Ok(mercator::web_mercator_to_geographic(c.x, c.y)),
        }
    }

    fn project(self, geo: Geographic) -> Result<Coord, GeoError> {
        let (x, y) = match self {
            Self::Geographic => geo.to_degrees(),
            Self::Utm(zone) => utm::geographic_to_utm(geo, zone)?,
            Self::WebMercator => mercator::geographic_to_web_mercator(geo),
        };
        Ok(Coord { x, y })
    }
}

/// Vrai si l'EPSG désigne des coordonnées géographiques en degrés
pub fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, 4326 | 4674 | 4618)
}

/// Transformation entre deux EPSG : Rust pur en priorité, PROJ en fallback
pub enum Transformer {
    /// Pas de reprojection (source == cible)
    Identity,
    /// Reprojection légère (pure Rust)
    Lite { source: LiteCrs, target: LiteCrs },
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(proj_backend::ProjTransformer),
}

impl Transformer {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoError> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if let (Some(source), Some(target)) = (
            LiteCrs::from_epsg(source_epsg),
            LiteCrs::from_epsg(target_epsg),
        ) {
            if source == target {
                return Ok(Self::Identity);
            }
            return Ok(Self::Lite { source, target });
        }

        #[cfg(feature = "reproject")]
        return proj_backend::ProjTransformer::new(source_epsg, target_epsg).map(Self::Proj);

        #[cfg(not(feature = "reproject"))]
        return Err(GeoError::reprojection(
            source_epsg,
            target_epsg,
            "unsupported without the `reproject` feature \
             (supported: 4326, 4674, 3857, 326xx, 327xx, 31971-31985)",
        ));
    }

    /// Transforme une coordonnée
    pub fn transform_coord(&self, c: Coord) -> Result<Coord, GeoError> {
        match self {
            Self::Identity => Ok(c),
            Self::Lite { source, target } => target.project(source.unproject(c)?),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => {
                match proj.transform_geometry(&Geometry::Point(geo::Point(c)))? {
                    Geometry::Point(p) => Ok(p.0),
                    _ => Ok(c),
                }
            }
        }
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, GeoError> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite { .. } => geom.try_map_coords(|c| self.transform_coord(c)),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    /// Retourne une description du transformer utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Lite { .. } => "lite (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}

/// Reprojette une collection
pub fn reproject(collection: &FeatureCollection, target: Target) -> FeatureCollection {
    let mut out = collection.empty_like();
    out.features = match target {
        Target::Epsg(epsg) => to_epsg(&collection.features, epsg),
        Target::LocalUtm => collection.features.iter().map(to_local_utm).collect(),
    };

    out.epsg = match (target, out.crs()) {
        (Target::Epsg(epsg), _) => epsg,
        (Target::LocalUtm, Crs::Epsg(epsg)) => epsg,
        (Target::LocalUtm, Crs::Mixed) => collection.epsg,
    };
    out
}

fn to_epsg(features: &[Feature], target: u32) -> Vec<Feature> {
    let mut transformers: HashMap<u32, Option<Transformer>> = HashMap::new();

    features
        .iter()
        .map(|feature| {
            let transformer = transformers.entry(feature.epsg).or_insert_with(|| {
                Transformer::new(feature.epsg, target)
                    .map_err(|e| {
                        warn!(
                            from = feature.epsg,
                            to = target,
                            error = %e,
                            "No transform available, relabelling CRS only"
                        );
                    })
                    .ok()
            });
            transform_or_relabel(feature, transformer.as_ref(), target)
        })
        .collect()
}

fn transform_or_relabel(feature: &Feature, transformer: Option<&Transformer>, target: u32) -> Feature {
    let geometry = match transformer.map(|t| t.transform_geometry(&feature.geometry)) {
        Some(Ok(geometry)) => geometry,
        Some(Err(e)) => {
            warn!(from = feature.epsg, to = target, error = %e, "Transform failed, relabelling CRS only");
            feature.geometry.clone()
        }
        None => feature.geometry.clone(),
    };
    Feature {
        geometry,
        values: feature.values.clone(),
        epsg: target,
    }
}

/// Centroïde d'une feature en degrés (lon, lat)
fn geographic_centroid(feature: &Feature) -> Option<(f64, f64)> {
    let centroid = feature.geometry.centroid()?;
    if is_geographic(feature.epsg) {
        return Some((centroid.x(), centroid.y()));
    }
    let transformer = Transformer::new(feature.epsg, 4326).ok()?;
    let c = transformer.transform_coord(centroid.0).ok()?;
    Some((c.x, c.y))
}

fn to_local_utm(feature: &Feature) -> Feature {
    let Some((lon, lat)) = geographic_centroid(feature) else {
        warn!(epsg = feature.epsg, "Cannot locate feature centroid, keeping CRS");
        return feature.clone();
    };

    if lat >= 0.0 {
        return feature.clone();
    }

    let target = 32700 + zone_number(lon, lat);
    if feature.epsg == target {
        return feature.clone();
    }
    let transformer = Transformer::new(feature.epsg, target)
        .map_err(|e| warn!(from = feature.epsg, to = target, error = %e, "No transform to local UTM"))
        .ok();
    transform_or_relabel(feature, transformer.as_ref(), target)
}
