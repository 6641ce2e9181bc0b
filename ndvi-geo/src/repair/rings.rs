//! Réparation de la validité polygonale par reconstruction des rings
//!
//! Chaque ring est nettoyé (points répétés, fermeture, rings dégénérés),
//! puis le polygone est reconstruit par overlay : union des extérieurs
//! moins l'union des intérieurs.

use geo::{Coord, LineString, MultiPolygon, Polygon, RemoveRepeatedPoints};

use crate::overlay;
use crate::GeoError;

/// Nettoie un ring ; `None` s'il ne délimite aucune surface
pub fn clean_ring(ring: &LineString) -> Option<LineString> {
    let mut coords: Vec<Coord> = ring
        .remove_repeated_points()
        .0
        .into_iter()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .collect();

    if coords.len() < 3 {
        return None;
    }
    if coords.first() != coords.last() {
        let first = coords[0];
        coords.push(first);
    }
    if coords.len() < 4 {
        return None;
    }

    if is_collinear(&coords) {
        return None;
    }
    Some(LineString::new(coords))
}

/// Vrai si tous les points sont alignés
fn is_collinear(coords: &[Coord]) -> bool {
    let a = coords[0];
    let Some(b) = coords.iter().copied().find(|&c| c != a) else {
        return true;
    };
    coords
        .iter()
        .all(|p| ((b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)) == 0.0)
}

/// Reconstruit un MultiPolygon valide
pub fn make_valid(mp: &MultiPolygon) -> Result<MultiPolygon, GeoError> {
    let mut shells = Vec::new();
    let mut holes = Vec::new();

    for polygon in mp.iter() {
        if let Some(exterior) = clean_ring(polygon.exterior()) {
            shells.push(overlay::normalize(&MultiPolygon::new(vec![Polygon::new(
                exterior,
                vec![],
            )]))?);
        }
        for interior in polygon.interiors() {
            if let Some(ring) = clean_ring(interior) {
                holes.push(overlay::normalize(&MultiPolygon::new(vec![Polygon::new(
                    ring,
                    vec![],
                )]))?);
            }
        }
    }

    let shells = overlay::union_all(shells)?;
    if holes.is_empty() {
        return Ok(shells);
    }
    let holes = overlay::union_all(holes)?;
    overlay::difference(&shells, &holes)
}
