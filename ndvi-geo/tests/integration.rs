//! Tests d'intégration : shapefile écrit sur disque, relu, réparé et agrégé

use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use geo::Area;
use ndvi_geo::{algebra, read_shapefile, repair, Crs, Value};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};

const PRJ_WGS84_UTM_23S: &str = r#"PROJCS["WGS_1984_UTM_Zone_23S",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",10000000.0],PARAMETER["Central_Meridian",-45.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;

/// Carré de `size` mètres, ring extérieur dans le sens horaire
fn square(x: f64, y: f64, size: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x, y),
        Point::new(x, y + size),
        Point::new(x + size, y + size),
        Point::new(x + size, y),
        Point::new(x, y),
    ]))
}

fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("INTERSECT_NDVI_FAZ_J1_2025.shp");
    let builder = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("FAZENDA").unwrap(), 20)
        .add_character_field(FieldName::try_from("ESTAGIO").unwrap(), 20)
        .add_numeric_field(FieldName::try_from("AREA_NDVI").unwrap(), 12, 4);
    let mut writer = shapefile::Writer::from_path(&path, builder).unwrap();

    let rows = [
        (square(200_000.0, 7_650_000.0, 100.0), "FAZ1", "1ºC", 1.0),
        (square(200_050.0, 7_650_000.0, 100.0), "FAZ1", "2° CORTE", 1.0),
        (square(300_000.0, 7_700_000.0, 200.0), "FAZ2", "", 4.0),
    ];
    for (shape, fazenda, estagio, area) in rows {
        let mut record = Record::default();
        record.insert("FAZENDA".to_string(), FieldValue::Character(Some(fazenda.to_string())));
        record.insert("ESTAGIO".to_string(), FieldValue::Character(Some(estagio.to_string())));
        record.insert("AREA_NDVI".to_string(), FieldValue::Numeric(Some(area)));
        writer.write_shape_and_record(&shape, &record).unwrap();
    }
    drop(writer);

    std::fs::write(path.with_extension("prj"), PRJ_WGS84_UTM_23S).unwrap();
    path
}

#[test]
fn test_read_repair_dissolve() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());

    let raw = read_shapefile(&path).unwrap();
    assert_eq!(raw.len(), 3);
    assert_eq!(raw.crs(), Crs::Epsg(32723));
    let names: Vec<&str> = raw.schema.names().collect();
    assert_eq!(names, vec!["FAZENDA", "ESTAGIO", "AREA_NDVI"]);

    let estagio = raw.column("ESTAGIO").unwrap();
    assert_eq!(raw.features[1].values[estagio], Value::from("2° CORTE"));
    assert!(raw.features[2].values[estagio].is_null());

    let clean = repair(&raw);
    assert_eq!(clean.crs(), Crs::Epsg(4326));
    assert_eq!(clean.len(), 3);

    let farms = algebra::dissolve(&clean, Some(&["FAZENDA"]), Some("AREA_HA")).unwrap();
    assert_eq!(farms.len(), 2);
    let area = farms.column("AREA_HA").unwrap();
    // 100x100 + 100x100 - 50x100 de recouvrement = 1.5 ha
    let faz1 = farms.features[0].values[area].as_f64().unwrap();
    assert_relative_eq!(faz1, 1.5, epsilon = 1e-3);
    let faz2 = farms.features[1].values[area].as_f64().unwrap();
    assert_relative_eq!(faz2, 4.0, epsilon = 1e-3);
    assert!(farms.features[0].geometry.unsigned_area() > 0.0);
}

#[test]
fn test_read_real_fixture() {
    let fixture = Path::new("../fixtures/INTERSECT_NDVI_J1_2025.shp");
    if !fixture.exists() {
        eprintln!("Fixture not found, skipping test");
        return;
    }

    let clean = repair(&read_shapefile(fixture).unwrap());
    assert!(!clean.is_empty());
    for feature in &clean.features {
        assert!(matches!(
            feature.geometry,
            geo::Geometry::Polygon(_) | geo::Geometry::MultiPolygon(_)
        ));
    }
}

#[test]
fn test_missing_shp_error_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    std::fs::remove_file(&path).unwrap();

    let err = read_shapefile(&path).unwrap_err();
    assert!(matches!(err, ndvi_geo::GeoError::Shapefile { .. }));
    assert!(
        err.to_string().contains("INTERSECT_NDVI_FAZ_J1_2025.shp"),
        "{}",
        err
    );
}
