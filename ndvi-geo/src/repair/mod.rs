//! Réparation des géométries
//!
//! Après `repair`, toutes les géométries sont des Polygon/MultiPolygon valides
//! en EPSG:4326. La réparation n'échoue jamais : dans le pire des cas la
//! feature porte un MultiPolygon vide.

pub mod rings;

use geo::{CoordsIter, Geometry, MultiPolygon, Validation};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::overlay;
use crate::reproject::{reproject, Target};
use crate::types::{Feature, FeatureCollection, WGS84_EPSG};

/// Raison d'élimination d'une feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyGeometry,
    DisallowedType,
}

/// Ce qui a été fait sur une géométrie conservée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepairTrace {
    /// GeometryCollection décomposée en parties polygonales
    pub decomposed: bool,
    /// Géométrie invalide reconstruite par `rings::make_valid`
    pub repaired: bool,
    /// Reconstruction échouée, buffer nul appliqué
    pub buffer_fallback: bool,
    /// Résultat vide
    pub degenerate: bool,
}

/// Résultat de la réparation d'une géométrie
#[derive(Debug, Clone, PartialEq)]
pub enum Repaired {
    Dropped(DropReason),
    Kept { geometry: Geometry, trace: RepairTrace },
}

/// Compteurs d'une passe de réparation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub input: usize,
    pub dropped_empty: usize,
    pub dropped_type: usize,
    pub decomposed: usize,
    pub repaired: usize,
    pub buffer_fallback: usize,
    pub degenerate: usize,
}

impl RepairStats {
    fn record(&mut self, outcome: &Repaired) {
        self.input += 1;
        match outcome {
            Repaired::Dropped(DropReason::EmptyGeometry) => self.dropped_empty += 1,
            Repaired::Dropped(DropReason::DisallowedType) => self.dropped_type += 1,
            Repaired::Kept { trace, .. } => {
                self.decomposed += trace.decomposed as usize;
                self.repaired += trace.repaired as usize;
                self.buffer_fallback += trace.buffer_fallback as usize;
                self.degenerate += trace.degenerate as usize;
            }
        }
    }
}

/// Répare une collection et la reprojette en EPSG:4326
pub fn repair(collection: &FeatureCollection) -> FeatureCollection {
    repair_with_stats(collection).0
}

/// Comme `repair`, en retournant les compteurs
pub fn repair_with_stats(collection: &FeatureCollection) -> (FeatureCollection, RepairStats) {
    let outcomes: Vec<(Repaired, &Feature)> = collection
        .features
        .par_iter()
        .map(|feature| (repair_geometry(&feature.geometry), feature))
        .collect();

    let mut stats = RepairStats::default();
    let mut repaired = collection.empty_like();
    for (outcome, feature) in outcomes {
        stats.record(&outcome);
        if let Repaired::Kept { geometry, .. } = outcome {
            repaired
                .features
                .push(Feature::new(geometry, feature.values.clone(), feature.epsg));
        }
    }

    debug!(
        input = stats.input,
        dropped_empty = stats.dropped_empty,
        dropped_type = stats.dropped_type,
        decomposed = stats.decomposed,
        repaired = stats.repaired,
        buffer_fallback = stats.buffer_fallback,
        degenerate = stats.degenerate,
        "Geometry repair done"
    );

    (reproject(&repaired, Target::Epsg(WGS84_EPSG)), stats)
}

/// Vrai si la géométrie n'a aucune coordonnée
pub fn is_empty(geometry: &Geometry) -> bool {
    geometry.coords_count() == 0
}

/// Répare une géométrie isolée (sans reprojection)
pub fn repair_geometry(geometry: &Geometry) -> Repaired {
    if is_empty(geometry) {
        return Repaired::Dropped(DropReason::EmptyGeometry);
    }

    let mut trace = RepairTrace::default();
    let mp = match geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => overlay::to_multi_polygon(geometry),
        Geometry::GeometryCollection(_) => {
            trace.decomposed = true;
            let parts: Vec<MultiPolygon> = overlay::polygons_of(geometry)
                .into_iter()
                .map(|p| MultiPolygon::new(vec![p]))
                .collect();
            if parts.is_empty() {
                return Repaired::Dropped(DropReason::DisallowedType);
            }
            let flattened = MultiPolygon::new(parts.iter().flat_map(|mp| mp.0.clone()).collect());
            overlay::union_all(parts).unwrap_or(flattened)
        }
        _ => return Repaired::Dropped(DropReason::DisallowedType),
    };

    let mp = if mp.is_valid() {
        mp
    } else {
        trace.repaired = true;
        match rings::make_valid(&mp) {
            Ok(fixed) if fixed.is_valid() => fixed,
            Ok(_) | Err(_) => {
                trace.buffer_fallback = true;
                zero_buffer(&mp).unwrap_or_else(|| {
                    warn!("Buffer fallback failed, geometry replaced by an empty MultiPolygon");
                    MultiPolygon::new(vec![])
                })
            }
        }
    };

    // Buffer nul systématique
    let mut mp = zero_buffer(&mp).unwrap_or(mp);
    if !mp.is_valid() {
        warn!("Geometry still invalid after repair, replaced by an empty MultiPolygon");
        mp = MultiPolygon::new(vec![]);
    }
    if mp.0.is_empty() {
        trace.degenerate = true;
    }

    Repaired::Kept {
        geometry: overlay::simplest(mp),
        trace,
    }
}

/// Buffer de largeur nulle (normalisation par la règle de remplissage) ; `None` si le moteur échoue
fn zero_buffer(mp: &MultiPolygon) -> Option<MultiPolygon> {
    if mp.0.is_empty() {
        return Some(mp.clone());
    }
    overlay::normalize(mp)
        .map_err(|e| warn!(error = %e, "Zero-width buffer failed"))
        .ok()
}
