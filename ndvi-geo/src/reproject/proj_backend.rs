//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use geo::{Coord, Geometry, MapCoords};
use proj::Proj;

use crate::GeoError;

/// Reprojection via la bibliothèque PROJ
pub struct ProjTransformer {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl ProjTransformer {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoError> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None)
            .map_err(|e| GeoError::reprojection(source_epsg, target_epsg, e.to_string()))?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, GeoError> {
        geom.try_map_coords(|c: Coord| {
            self.proj
                .convert((c.x, c.y))
                .map(|(x, y)| Coord { x, y })
                .map_err(|e| {
                    GeoError::reprojection(self.source_epsg, self.target_epsg, e.to_string())
                })
        })
    }
}
