//! Lecture d'un shapefile (.shp + .dbf + .prj) en `FeatureCollection`

use std::path::Path;

use chrono::NaiveDate;
use geo::{Geometry, MultiPolygon};
use shapefile::dbase::{FieldType, FieldValue, Reader as DbfReader};
use shapefile::Shape;
use tracing::{debug, warn};

use crate::types::{Field, FieldKind, FeatureCollection, Schema, Value, WGS84_EPSG};
use crate::{prj, GeoError};

/// Lit un shapefile complet
///
/// L'ordre des champs suit le .dbf. Le CRS est déduit du .prj voisin ;
/// absent ou non reconnu, EPSG:4326 est supposé.
pub fn read_shapefile(path: &Path) -> Result<FeatureCollection, GeoError> {
    let shown = path.display().to_string();
    let schema = read_schema(&path.with_extension("dbf"))?;
    let epsg = read_prj(path);

    let mut reader =
        shapefile::Reader::from_path(path).map_err(|e| GeoError::shapefile(&shown, e))?;

    let mut collection = FeatureCollection::new(schema, epsg);
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item.map_err(|e| GeoError::shapefile(&shown, e))?;
        let geometry = shape_to_geometry(shape).map_err(|e| GeoError::shapefile(&shown, e))?;
        let values = collection
            .schema
            .fields()
            .iter()
            .map(|field| record.get(&field.name).map(field_value).unwrap_or_default())
            .collect();
        collection.push(geometry, values);
    }

    debug!(path = %shown, features = collection.len(), epsg, "Shapefile read");
    Ok(collection)
}

/// EPSG du .prj voisin, 4326 par défaut
pub fn read_prj(shp_path: &Path) -> u32 {
    let prj_path = shp_path.with_extension("prj");
    match std::fs::read_to_string(&prj_path) {
        Ok(wkt) => prj::parse(&wkt).unwrap_or_else(|e| {
            warn!(path = %prj_path.display(), error = %e, "Unrecognised .prj, assuming EPSG:4326");
            WGS84_EPSG
        }),
        Err(_) => {
            warn!(path = %prj_path.display(), "Missing .prj, assuming EPSG:4326");
            WGS84_EPSG
        }
    }
}

fn read_schema(dbf_path: &Path) -> Result<Schema, GeoError> {
    let reader = DbfReader::from_path(dbf_path)
        .map_err(|e| GeoError::shapefile(dbf_path.display().to_string(), e))?;

    let fields = reader
        .fields()
        .iter()
        .filter(|info| info.name() != "DeletionFlag")
        .map(|info| Field::new(info.name(), field_kind(info.field_type())))
        .collect();
    Ok(Schema::new(fields))
}

fn field_kind(field_type: FieldType) -> FieldKind {
    match field_type {
        FieldType::Numeric | FieldType::Float | FieldType::Double | FieldType::Currency => {
            FieldKind::Number
        }
        FieldType::Integer => FieldKind::Integer,
        FieldType::Date | FieldType::DateTime => FieldKind::Date,
        _ => FieldKind::Text,
    }
}

/// Conversion d'une valeur dBase ; texte trimé, vide -> Null
fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                Value::Text(s.to_string())
            }
        }
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            Value::Number(*n)
        }
        FieldValue::Float(Some(f)) => Value::Number(f64::from(*f)),
        FieldValue::Integer(i) => Value::Integer(i64::from(*i)),
        FieldValue::Logical(Some(b)) => Value::Text(if *b { "T" } else { "F" }.to_string()),
        FieldValue::Date(Some(d)) => NaiveDate::from_ymd_opt(d.year() as i32, d.month(), d.day())
            .map(Value::Date)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Une forme nulle devient une géométrie vide (éliminée par la réparation)
fn shape_to_geometry(shape: Shape) -> Result<Geometry, String> {
    match shape {
        Shape::NullShape => Ok(Geometry::MultiPolygon(MultiPolygon::new(vec![]))),
        other => Geometry::try_from(other).map_err(|e| e.to_string()),
    }
}
