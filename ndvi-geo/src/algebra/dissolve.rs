use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use geo::{Geometry, MultiPolygon, Validation};
use tracing::debug;

use super::{area, retry_after_repair};
use crate::overlay;
use crate::reproject::{reproject, Target};
use crate::types::{Crs, FeatureCollection, Value, WGS84_EPSG};
use crate::GeoError;

/// Fusionne les géométries, globalement ou par groupe de valeurs
///
/// Les attributs hors groupe prennent la valeur de la première feature du
/// groupe. Les groupes sont émis triés par clé, les valeurs nulles en dernier.
/// Avec `area_column`, la surface en hectares est calculée sur le résultat.
pub fn dissolve(
    collection: &FeatureCollection,
    group_fields: Option<&[&str]>,
    area_column: Option<&str>,
) -> Result<FeatureCollection, GeoError> {
    let dissolved = retry_after_repair(collection, |c| dissolve_once(c, group_fields))?;

    if let Some(fields) = group_fields {
        let all_empty = dissolved
            .features
            .iter()
            .all(|f| crate::repair::is_empty(&f.geometry));
        if all_empty {
            return Err(GeoError::EmptyDissolveResult {
                group_fields: fields.join(", "),
            });
        }
    }

    Ok(match area_column {
        Some(column) => area(&dissolved, column),
        None => reproject(&dissolved, Target::Epsg(WGS84_EPSG)),
    })
}

fn dissolve_once(
    collection: &FeatureCollection,
    group_fields: Option<&[&str]>,
) -> Result<FeatureCollection, GeoError> {
    let indices: Vec<usize> = group_fields
        .unwrap_or_default()
        .iter()
        .map(|name| {
            collection
                .column(name)
                .ok_or_else(|| GeoError::UnknownField(name.to_string()))
        })
        .collect::<Result<_, _>>()?;

    // L'union exige un CRS commun
    let collection = match collection.crs() {
        Crs::Mixed => Cow::Owned(reproject(collection, Target::Epsg(WGS84_EPSG))),
        Crs::Epsg(_) => Cow::Borrowed(collection),
    };

    let mut groups: Vec<(usize, Vec<MultiPolygon>)> = Vec::new();
    let mut by_key: HashMap<Vec<String>, usize> = HashMap::new();

    for (i, feature) in collection.features.iter().enumerate() {
        if !matches!(
            feature.geometry,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_)
        ) || !feature.geometry.is_valid()
        {
            return Err(GeoError::overlay(
                "dissolve",
                format!("feature {} is not a valid areal geometry", i),
            ));
        }

        let key: Vec<String> = indices
            .iter()
            .map(|&idx| key_fragment(feature.value(idx)))
            .collect();
        let slot = *by_key.entry(key).or_insert_with(|| {
            groups.push((i, Vec::new()));
            groups.len() - 1
        });
        groups[slot]
            .1
            .push(overlay::to_multi_polygon(&feature.geometry));
    }

    groups.sort_by(|(a, _), (b, _)| {
        let (a, b) = (&collection.features[*a], &collection.features[*b]);
        indices
            .iter()
            .map(|&idx| compare_values(a.value(idx), b.value(idx)))
            .find(|order| order.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    let mut out = collection.empty_like();
    if groups.is_empty() && group_fields.is_none() {
        out.push(Geometry::MultiPolygon(MultiPolygon::new(vec![])), vec![]);
        return Ok(out);
    }

    for (first, parts) in groups {
        let union = overlay::union_all(parts)?;
        let values: Vec<Value> = collection.features[first].values.clone();
        out.push(overlay::simplest(union), values);
    }

    debug!(
        input = collection.len(),
        groups = out.len(),
        "Dissolve done"
    );
    Ok(out)
}

/// Fragment de clé distinguant le type et la valeur
fn key_fragment(value: &Value) -> String {
    format!("{:?}", value)
}

/// Ordre des clés de groupe : même type comparé par valeur, nombres entre
/// eux, puis texte, dates et `Null` en dernier
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Integer(_) | Value::Number(_) => 0,
            Value::Text(_) => 1,
            Value::Date(_) => 2,
            Value::Null => 3,
        }
    }

    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) if rank(a) == 0 && rank(b) == 0 => x.total_cmp(&y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FieldKind, Schema};
    use approx::assert_relative_eq;
    use geo::{polygon, Area, GeometryCollection, LineString, Polygon};

    fn square(x: f64, y: f64, size: f64) -> Geometry {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ])
    }

    fn farms() -> FeatureCollection {
        let schema = Schema::new(vec![
            Field::new("FAZENDA", FieldKind::Text),
            Field::new("TALHAO", FieldKind::Integer),
        ]);
        let mut fc = FeatureCollection::new(schema, 4326);
        fc.push(square(0.0, 0.0, 2.0), vec!["F1".into(), 1i64.into()]);
        fc.push(square(1.0, 0.0, 2.0), vec!["F1".into(), 2i64.into()]);
        fc.push(square(10.0, 10.0, 1.0), vec!["F2".into(), 3i64.into()]);
        fc
    }

    #[test]
    fn test_dissolve_all() {
        let out = dissolve(&farms(), None, None).unwrap();
        assert_eq!(out.len(), 1);
        // 2x2 + 2x2 - 1x2 de recouvrement + 1
        assert_relative_eq!(out.features[0].geometry.unsigned_area(), 7.0, epsilon = 1e-9);
        assert_eq!(out.features[0].values[1], Value::Integer(1));
    }

    #[test]
    fn test_dissolve_grouped_first_value_wins() {
        let out = dissolve(&farms(), Some(&["FAZENDA"]), None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.features[0].values[0], Value::from("F1"));
        assert_eq!(out.features[0].values[1], Value::Integer(1));
        assert_relative_eq!(out.features[0].geometry.unsigned_area(), 6.0, epsilon = 1e-9);
        assert_eq!(out.features[1].values[0], Value::from("F2"));
    }

    #[test]
    fn test_dissolve_groups_sorted_by_key() {
        let schema = Schema::new(vec![
            Field::new("FAZENDA", FieldKind::Text),
            Field::new("TALHAO", FieldKind::Integer),
        ]);
        let mut fc = FeatureCollection::new(schema, 4326);
        fc.push(square(0.0, 0.0, 1.0), vec!["F2".into(), 10i64.into()]);
        fc.push(square(2.0, 0.0, 1.0), vec![Value::Null, 1i64.into()]);
        fc.push(square(4.0, 0.0, 1.0), vec!["F1".into(), 9i64.into()]);
        fc.push(square(6.0, 0.0, 1.0), vec!["F1".into(), 2i64.into()]);

        let out = dissolve(&fc, Some(&["FAZENDA", "TALHAO"]), None).unwrap();
        let keys: Vec<(Value, Value)> = out
            .features
            .iter()
            .map(|f| (f.values[0].clone(), f.values[1].clone()))
            .collect();
        let expected: Vec<(Value, Value)> = vec![
            ("F1".into(), 2i64.into()),
            ("F1".into(), 9i64.into()),
            ("F2".into(), 10i64.into()),
            (Value::Null, 1i64.into()),
        ];
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_dissolve_unknown_field() {
        assert!(matches!(
            dissolve(&farms(), Some(&["SAFRA"]), None),
            Err(GeoError::UnknownField(_))
        ));
    }

    #[test]
    fn test_dissolve_empty_grouped_result() {
        let fc = FeatureCollection::new(farms().schema, 4326);
        assert!(matches!(
            dissolve(&fc, Some(&["FAZENDA"]), None),
            Err(GeoError::EmptyDissolveResult { .. })
        ));
    }

    #[test]
    fn test_dissolve_retries_after_repair() {
        let mut fc = farms();
        // Une GeometryCollection bloque l'union : la réparation la décompose
        fc.features[2].geometry = Geometry::GeometryCollection(GeometryCollection::new_from(vec![
            square(10.0, 10.0, 1.0),
            Geometry::LineString(LineString::from(vec![(0.0, 0.0), (5.0, 5.0)])),
        ]));
        let out = dissolve(&fc, None, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.features[0].geometry.unsigned_area(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dissolve_with_area() {
        // ~1 km x 1 km autour de Ribeirão Preto
        let schema = Schema::new(vec![Field::new("FAZENDA", FieldKind::Text)]);
        let mut fc = FeatureCollection::new(schema, 4326);
        fc.push(square(-47.81, -21.18, 0.009), vec!["F1".into()]);
        fc.push(
            Geometry::Polygon(Polygon::new(
                LineString::from(vec![
                    (-47.81, -21.18),
                    (-47.801, -21.18),
                    (-47.801, -21.171),
                    (-47.81, -21.171),
                    (-47.81, -21.18),
                ]),
                vec![],
            )),
            vec!["F1".into()],
        );

        let out = dissolve(&fc, Some(&["FAZENDA"]), Some("AREA_HA")).unwrap();
        assert_eq!(out.len(), 1);
        let idx = out.column("AREA_HA").unwrap();
        let ha = out.features[0].values[idx].as_f64().unwrap();
        assert!(ha > 90.0 && ha < 100.0, "ha={}", ha);
        assert_eq!(out.epsg, 4326);
    }
}
