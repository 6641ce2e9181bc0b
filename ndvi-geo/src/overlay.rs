//! Opérations booléennes protégées
//!
//! Le moteur d'overlay peut paniquer sur des entrées dégénérées : chaque
//! opération passe par `guarded`, qui convertit une panique en `GeoError::Overlay`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};

use crate::GeoError;

/// Exécute une opération d'overlay en convertissant les paniques en erreur
pub fn guarded<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, GeoError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic in overlay engine".to_string());
        GeoError::overlay(operation, reason)
    })
}

/// Parties polygonales d'une géométrie (les parties linéaires et ponctuelles sont ignorées)
pub fn polygons_of(geometry: &Geometry) -> Vec<Polygon> {
    let mut out = Vec::new();
    collect_polygons(geometry, &mut out);
    out
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in gc.iter() {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}

/// Convertit une géométrie polygonale en MultiPolygon
pub fn to_multi_polygon(geometry: &Geometry) -> MultiPolygon {
    MultiPolygon::new(polygons_of(geometry))
}

/// Géométrie la plus simple pour un MultiPolygon (Polygon s'il n'a qu'une partie)
pub fn simplest(mut mp: MultiPolygon) -> Geometry {
    if mp.0.len() == 1 {
        if let Some(polygon) = mp.0.pop() {
            return Geometry::Polygon(polygon);
        }
    }
    Geometry::MultiPolygon(mp)
}

/// Union de toutes les géométries, réduite deux à deux de façon équilibrée
pub fn union_all(parts: Vec<MultiPolygon>) -> Result<MultiPolygon, GeoError> {
    let mut level: Vec<MultiPolygon> = parts.into_iter().filter(|mp| !mp.0.is_empty()).collect();
    if level.is_empty() {
        return Ok(MultiPolygon::new(vec![]));
    }
    if level.len() == 1 {
        return normalize(&level[0]);
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut iter = level.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(guarded("union", || a.union(&b))?),
                None => next.push(a),
            }
        }
        level = next;
    }
    Ok(level.pop().unwrap_or_else(|| MultiPolygon::new(vec![])))
}

/// Normalisation par la règle de remplissage (union avec le vide)
pub fn normalize(mp: &MultiPolygon) -> Result<MultiPolygon, GeoError> {
    guarded("normalize", || mp.union(&MultiPolygon::new(vec![])))
}

pub fn intersection(a: &MultiPolygon, b: &MultiPolygon) -> Result<MultiPolygon, GeoError> {
    guarded("intersection", || a.intersection(b))
}

pub fn difference(a: &MultiPolygon, b: &MultiPolygon) -> Result<MultiPolygon, GeoError> {
    guarded("difference", || a.difference(b))
}
