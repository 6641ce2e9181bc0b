//! Algèbre géométrique sur les collections
//!
//! Toutes les opérations produisent des collections réparées en EPSG:4326.

mod dissolve;
mod measure;
mod pairwise;

pub use dissolve::dissolve;
pub use measure::{area, buffer, round_hectares};
pub use pairwise::{intersect, symmetric_difference};

use tracing::warn;

use crate::repair::repair;
use crate::types::{Field, FeatureCollection, Schema};
use crate::GeoError;

/// Exécute `op` ; sur un échec d'overlay, répare l'entrée et réessaie une fois
pub fn retry_after_repair<T>(
    collection: &FeatureCollection,
    op: impl Fn(&FeatureCollection) -> Result<T, GeoError>,
) -> Result<T, GeoError> {
    match op(collection) {
        Err(e @ GeoError::Overlay { .. }) => {
            warn!(error = %e, "Overlay failed, repairing geometries and retrying");
            op(&repair(collection))
        }
        other => other,
    }
}

/// Schéma fusionné de deux collections ; les noms en collision reçoivent `_1` / `_2`
pub(crate) fn merge_schemas(left: &Schema, right: &Schema) -> Schema {
    let collides = |name: &str, other: &Schema| other.index_of(name).is_some();

    let mut fields: Vec<Field> = left
        .fields()
        .iter()
        .map(|f| {
            let name = if collides(&f.name, right) {
                format!("{}_1", f.name)
            } else {
                f.name.clone()
            };
            Field::new(name, f.kind)
        })
        .collect();

    fields.extend(right.fields().iter().map(|f| {
        let name = if collides(&f.name, left) {
            format!("{}_2", f.name)
        } else {
            f.name.clone()
        };
        Field::new(name, f.kind)
    }));

    Schema::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldKind;
    use std::cell::Cell;

    #[test]
    fn test_merge_schemas_suffixes_collisions() {
        let left = Schema::new(vec![
            Field::new("FAZENDA", FieldKind::Text),
            Field::new("AREA", FieldKind::Number),
        ]);
        let right = Schema::new(vec![
            Field::new("AREA", FieldKind::Number),
            Field::new("GRIDCODE", FieldKind::Integer),
        ]);
        let merged = merge_schemas(&left, &right);
        let names: Vec<&str> = merged.names().collect();
        assert_eq!(names, vec!["FAZENDA", "AREA_1", "AREA_2", "GRIDCODE"]);
    }

    #[test]
    fn test_retry_after_repair_retries_once() {
        let fc = FeatureCollection::new(Schema::default(), 4326);
        let calls = Cell::new(0);
        let result: Result<(), GeoError> = retry_after_repair(&fc, |_| {
            calls.set(calls.get() + 1);
            Err(GeoError::overlay("union", "boom"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_retry_after_repair_other_errors_not_retried() {
        let fc = FeatureCollection::new(Schema::default(), 4326);
        let calls = Cell::new(0);
        let result: Result<(), GeoError> = retry_after_repair(&fc, |_| {
            calls.set(calls.get() + 1);
            Err(GeoError::UnknownField("X".into()))
        });
        assert!(matches!(result, Err(GeoError::UnknownField(_))));
        assert_eq!(calls.get(), 1);
    }
}
