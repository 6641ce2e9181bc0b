use geo::{Area, BoundingRect, Intersects, MultiPolygon, Rect};
use rayon::prelude::*;
use tracing::debug;

use super::{area, merge_schemas};
use crate::overlay;
use crate::repair::repair;
use crate::types::{Feature, FeatureCollection, Value, WGS84_EPSG};
use crate::GeoError;

/// Feature préparée pour l'overlay
struct Prepared<'a> {
    shape: MultiPolygon,
    bbox: Option<Rect>,
    values: &'a [Value],
}

fn prepare(collection: &FeatureCollection) -> Vec<Prepared<'_>> {
    collection
        .features
        .iter()
        .map(|f| {
            let shape = overlay::to_multi_polygon(&f.geometry);
            Prepared {
                bbox: shape.bounding_rect(),
                shape,
                values: &f.values,
            }
        })
        .collect()
}

fn bbox_overlaps(a: Option<Rect>, b: Option<Rect>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}

fn concat_values(left: &[Value], right: &[Value]) -> Vec<Value> {
    left.iter().chain(right.iter()).cloned().collect()
}

/// Intersection deux à deux des features, avec les attributs des deux sources
///
/// Le schéma résultant contient les champs de `a` puis ceux de `b`.
pub fn intersect(a: &FeatureCollection, b: &FeatureCollection) -> Result<FeatureCollection, GeoError> {
    let a = repair(a);
    let b = repair(b);
    let left = prepare(&a);
    let right = prepare(&b);

    let pieces: Vec<Vec<Feature>> = left
        .par_iter()
        .map(|l| {
            let mut out = Vec::new();
            for r in right.iter().filter(|r| bbox_overlaps(l.bbox, r.bbox)) {
                let piece = overlay::intersection(&l.shape, &r.shape)?;
                if piece.unsigned_area() > 0.0 {
                    out.push(Feature::new(
                        overlay::simplest(piece),
                        concat_values(l.values, r.values),
                        WGS84_EPSG,
                    ));
                }
            }
            Ok(out)
        })
        .collect::<Result<_, GeoError>>()?;

    let mut result = FeatureCollection::new(merge_schemas(&a.schema, &b.schema), WGS84_EPSG);
    result.features = pieces.into_iter().flatten().collect();
    debug!(left = a.len(), right = b.len(), pieces = result.len(), "Intersect done");
    Ok(repair(&result))
}

/// Différence symétrique : parties de `a` hors de `b`, puis parties de `b` hors de `a`
///
/// Les attributs de l'autre source sont nuls. Avec `area_column`, la surface
/// en hectares de chaque partie est calculée.
pub fn symmetric_difference(
    a: &FeatureCollection,
    b: &FeatureCollection,
    area_column: Option<&str>,
) -> Result<FeatureCollection, GeoError> {
    let a = repair(a);
    let b = repair(b);
    let left = prepare(&a);
    let right = prepare(&b);

    let left_nulls = vec![Value::Null; a.schema.len()];
    let right_nulls = vec![Value::Null; b.schema.len()];

    let left_only = outside(&left, &right, |values| concat_values(values, &right_nulls))?;
    let right_only = outside(&right, &left, |values| concat_values(&left_nulls, values))?;

    let mut result = FeatureCollection::new(merge_schemas(&a.schema, &b.schema), WGS84_EPSG);
    result.features = left_only.into_iter().chain(right_only).collect();
    debug!(left = a.len(), right = b.len(), pieces = result.len(), "Symmetric difference done");

    Ok(match area_column {
        Some(column) => area(&result, column),
        None => repair(&result),
    })
}

/// Parties de chaque feature de `subjects` non couvertes par `others`
fn outside(
    subjects: &[Prepared<'_>],
    others: &[Prepared<'_>],
    values: impl Fn(&[Value]) -> Vec<Value> + Sync,
) -> Result<Vec<Feature>, GeoError> {
    let pieces: Vec<Option<Feature>> = subjects
        .par_iter()
        .map(|s| {
            let covering: Vec<MultiPolygon> = others
                .iter()
                .filter(|o| bbox_overlaps(s.bbox, o.bbox))
                .map(|o| o.shape.clone())
                .collect();
            let remainder = if covering.is_empty() {
                s.shape.clone()
            } else {
                overlay::difference(&s.shape, &overlay::union_all(covering)?)?
            };
            Ok((remainder.unsigned_area() > 0.0).then(|| {
                Feature::new(overlay::simplest(remainder), values(s.values), WGS84_EPSG)
            }))
        })
        .collect::<Result<_, GeoError>>()?;
    Ok(pieces.into_iter().flatten().collect())
}
