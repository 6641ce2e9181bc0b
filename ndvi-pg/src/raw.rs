//! Envoi des lignes brutes d'un shapefile d'intersection
//!
//! Chaque feature devient une ligne de la table brute : colonnes en
//! minuscules, géométrie en EWKT SIRGAS 2000, nombres et dates convertis de
//! façon tolérante. Une unité déjà présente n'est remplacée que sur demande.

use chrono::NaiveDate;
use geo::Geometry;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use ndvi_geo::repair::is_empty;
use ndvi_geo::{reproject, FeatureCollection, Target, Value};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coerce::CoercionReport;
use crate::error::WarehouseError;
use crate::load::{with_retry, LoadOutcome, RawStore, RetryPolicy, UnitScope};

/// SIRGAS 2000 géographique
pub const RAW_EPSG: u32 = 4674;

/// Colonnes de la table brute, dans l'ordre d'insertion
pub const RAW_COLUMNS: [&str; 52] = [
    "gridcode", "setor", "fazenda", "bloco", "talhao", "safra", "tp_prop", "chave", "objetivo",
    "secao", "pivo", "desc_faz", "variedade", "maturacao", "ambiente", "estagio", "grupo_dash",
    "grupo_ndvi", "nmro_corte", "desc_cana", "area_bd", "a_est_moag", "a_colhida", "a_est_muda",
    "a_muda", "tch_est", "tc_est", "tch_rest", "tc_rest", "tch_real", "tc_real", "dt_corte",
    "dt_ult_cor", "dt_plantio", "idade_cort", "atr", "atr_est", "irrigacao", "tah", "tph",
    "cliente", "tch_v0", "tc_v0", "area_gis", "obs_img", "data_img", "idade_img", "classe",
    "area_ndvi", "clientes_id", "janela", "geom",
];

const NUMERIC_COLUMNS: [&str; 21] = [
    "area_bd", "a_est_moag", "a_colhida", "a_est_muda", "a_muda", "tch_est", "tc_est",
    "tch_rest", "tc_rest", "tch_real", "tc_real", "idade_cort", "atr", "atr_est", "tah", "tph",
    "tch_v0", "tc_v0", "area_gis", "idade_img", "area_ndvi",
];

const DATE_COLUMNS: [&str; 4] = ["dt_corte", "dt_ult_cor", "dt_plantio", "data_img"];

/// Valeur d'une cellule de la table brute
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    /// EWKT (`SRID=4674;...`)
    Geometry(String),
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Text(s) => RawValue::Text(s.clone()),
            Value::Number(n) if n.is_nan() => RawValue::Null,
            Value::Number(n) => RawValue::Number(*n),
            Value::Integer(i) => RawValue::Integer(*i),
            Value::Date(d) => RawValue::Date(*d),
        }
    }
}

/// Lignes prêtes à insérer, alignées sur [`RAW_COLUMNS`]
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub rows: Vec<Vec<RawValue>>,
    pub coercion: CoercionReport,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Source d'une colonne brute
enum Source {
    Column(usize),
    Missing,
    ClientId,
    Safra,
    Janela,
    Geometry,
}

/// EWKT d'une géométrie ; `None` si elle est vide
fn to_ewkt(geometry: &Geometry, epsg: u32) -> Result<Option<String>, WarehouseError> {
    if is_empty(geometry) {
        return Ok(None);
    }
    let mut wkt = Vec::new();
    geometry
        .process_geom(&mut WktWriter::new(&mut wkt))
        .map_err(|e| WarehouseError::Encode {
            what: "geometry",
            reason: e.to_string(),
        })?;
    Ok(Some(format!("SRID={};{}", epsg, String::from_utf8_lossy(&wkt))))
}

/// Construit la table brute d'une unité
pub fn prepare(collection: &FeatureCollection, scope: &UnitScope) -> Result<RawTable, WarehouseError> {
    let projected = reproject(collection, Target::Epsg(RAW_EPSG));

    let mut schema = projected.schema.clone();
    schema.rename_all(|name| name.to_lowercase());

    let sources: Vec<Source> = RAW_COLUMNS
        .iter()
        .map(|column| match *column {
            "clientes_id" => Source::ClientId,
            "safra" => Source::Safra,
            "janela" => Source::Janela,
            "geom" => Source::Geometry,
            other => schema.index_of(other).map_or(Source::Missing, Source::Column),
        })
        .collect();

    let missing: Vec<&str> = RAW_COLUMNS
        .iter()
        .zip(&sources)
        .filter(|(_, s)| matches!(s, Source::Missing))
        .map(|(c, _)| *c)
        .collect();
    if !missing.is_empty() {
        debug!(columns = ?missing, "Raw columns absent from shapefile, filled with NULL");
    }

    let mut table = RawTable::default();
    for feature in &projected.features {
        let mut row = Vec::with_capacity(RAW_COLUMNS.len());
        for (column, source) in RAW_COLUMNS.iter().zip(&sources) {
            let cell = match source {
                Source::ClientId => RawValue::Integer(scope.client_id),
                Source::Safra => RawValue::Integer(i64::from(scope.safra)),
                Source::Janela => RawValue::Text(scope.janela.clone()),
                Source::Geometry => to_ewkt(&feature.geometry, feature.epsg)?
                    .map_or(RawValue::Null, RawValue::Geometry),
                Source::Missing => RawValue::Null,
                Source::Column(index) => {
                    let value = feature.value(*index);
                    if NUMERIC_COLUMNS.contains(column) {
                        table
                            .coercion
                            .number(column, value)
                            .map_or(RawValue::Null, RawValue::Number)
                    } else if DATE_COLUMNS.contains(column) {
                        table
                            .coercion
                            .date(column, value)
                            .map_or(RawValue::Null, RawValue::Date)
                    } else {
                        RawValue::from(value)
                    }
                }
            };
            row.push(cell);
        }
        table.rows.push(row);
    }
    Ok(table)
}

/// Résultat d'un envoi brut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RawUploadOutcome {
    /// L'unité avait déjà des lignes et le remplacement n'était pas demandé
    Skipped { existing: u64 },
    Stored(LoadOutcome),
}

/// Envoie la table brute d'une unité
pub async fn upload(
    store: &dyn RawStore,
    scope: &UnitScope,
    table: &RawTable,
    replace: bool,
    retry: &RetryPolicy,
) -> Result<RawUploadOutcome, WarehouseError> {
    let existing = with_retry(retry, "count raw rows", || store.count_raw(scope)).await?;
    if existing > 0 && !replace {
        warn!(
            unit = %scope,
            existing,
            "Raw rows already present, use --replace to overwrite"
        );
        return Ok(RawUploadOutcome::Skipped { existing });
    }

    let outcome = with_retry(retry, "store raw rows", || {
        store.store_raw(scope, table, existing > 0)
    })
    .await?;

    info!(
        unit = %scope,
        deleted = outcome.deleted,
        inserted = outcome.inserted,
        coercion_failures = table.coercion.total_failures(),
        "Raw rows uploaded"
    );
    Ok(RawUploadOutcome::Stored(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::MemoryWarehouse;
    use geo::polygon;
    use ndvi_geo::{Field, FieldKind, Schema};

    fn column(name: &str) -> usize {
        RAW_COLUMNS.iter().position(|c| *c == name).unwrap()
    }

    fn collection() -> FeatureCollection {
        let schema = Schema::new(vec![
            Field::new("FAZENDA", FieldKind::Text),
            Field::new("Area_BD", FieldKind::Text),
            Field::new("DT_ULT_COR", FieldKind::Text),
            Field::new("SAFRA", FieldKind::Integer),
            Field::new("EXTRA", FieldKind::Text),
        ]);
        let mut fc = FeatureCollection::new(schema, 4326);
        let square = Geometry::Polygon(polygon![
            (x: -47.0, y: -22.0),
            (x: -46.9, y: -22.0),
            (x: -46.9, y: -21.9),
            (x: -47.0, y: -21.9),
        ]);
        fc.push(
            square.clone(),
            vec!["FAZ1".into(), "1.234,5".into(), "15/05/2024".into(), 1999i64.into(), "x".into()],
        );
        fc.push(
            square,
            vec!["FAZ2".into(), "n/a".into(), "ontem".into(), Value::Null, Value::Null],
        );
        fc
    }

    #[test]
    fn test_prepare_rows() {
        let scope = UnitScope::new(2, 2025, "J1");
        let table = prepare(&collection(), &scope).unwrap();

        assert_eq!(table.len(), 2);
        let row = &table.rows[0];
        assert_eq!(row.len(), RAW_COLUMNS.len());
        assert_eq!(row[column("fazenda")], RawValue::Text("FAZ1".into()));
        assert_eq!(row[column("area_bd")], RawValue::Number(1234.5));
        assert_eq!(
            row[column("dt_ult_cor")],
            RawValue::Date(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap())
        );
        assert_eq!(row[column("safra")], RawValue::Integer(2025));
        assert_eq!(row[column("clientes_id")], RawValue::Integer(2));
        assert_eq!(row[column("janela")], RawValue::Text("J1".into()));
        assert_eq!(row[column("talhao")], RawValue::Null);
        match &row[column("geom")] {
            RawValue::Geometry(ewkt) => assert!(ewkt.starts_with("SRID=4674;POLYGON")),
            other => panic!("unexpected geometry cell: {:?}", other),
        }

        assert_eq!(table.rows[1][column("area_bd")], RawValue::Null);
        assert_eq!(table.coercion.failures.get("dt_ult_cor"), Some(&1));
        assert_eq!(table.coercion.failures.get("area_bd"), None);
    }

    #[tokio::test]
    async fn test_upload_skips_existing_unit_unless_replace() {
        let store = MemoryWarehouse::default();
        let scope = UnitScope::new(2, 2025, "J1");
        let table = prepare(&collection(), &scope).unwrap();
        let retry = RetryPolicy::none();

        let first = upload(&store, &scope, &table, false, &retry).await.unwrap();
        assert_eq!(
            first,
            RawUploadOutcome::Stored(LoadOutcome { deleted: 0, inserted: 2 })
        );

        let second = upload(&store, &scope, &table, false, &retry).await.unwrap();
        assert_eq!(second, RawUploadOutcome::Skipped { existing: 2 });

        let third = upload(&store, &scope, &table, true, &retry).await.unwrap();
        assert_eq!(
            third,
            RawUploadOutcome::Stored(LoadOutcome { deleted: 2, inserted: 2 })
        );
        assert_eq!(store.raw_rows(&scope).len(), 2);
    }
}
