//! Export vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use ndvi_geo::{Feature, FeatureCollection, Schema, Value};
use serde_json::{Map, Number};

/// Exporte une collection en GeoJSON, dans son CRS
pub fn export_to_geojson(collection: &FeatureCollection, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_collection(&mut writer, collection)?;
    writer.flush()?;
    Ok(())
}

/// Écrit la FeatureCollection, membre `crs` compris
pub fn write_collection<W: Write>(writer: &mut W, collection: &FeatureCollection) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        collection.epsg
    )?;

    for (i, feature) in collection.features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, &collection.schema, i, feature)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

fn write_feature<W: Write>(
    writer: &mut W,
    schema: &Schema,
    id: usize,
    feature: &Feature,
) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":{},"geometry":"#, id)?;

    let mut geom_buf = Vec::new();
    feature
        .geometry
        .process_geom(&mut GeoJsonWriter::new(&mut geom_buf))?;
    writer.write_all(&geom_buf)?;

    let properties: Map<String, serde_json::Value> = schema
        .fields()
        .iter()
        .zip(&feature.values)
        .map(|(field, value)| (field.name.clone(), to_json(value)))
        .collect();
    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &properties)?;
    write!(writer, "}}")?;

    Ok(())
}

/// Valeur JSON d'une cellule ; nombres non finis et dates en texte ISO
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Number(n) => Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
    }
}
