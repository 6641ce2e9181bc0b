//! Classification des polygones d'intersection NDVI
//!
//! Les règles sont évaluées ligne à ligne, dans un ordre fixe ; une étape
//! peut écraser ce qu'une étape précédente a posé :
//!
//! 1. résolution des colonnes (majuscules, alias)
//! 2. contrat (`TP_PROP`)
//! 3. estágio dérivé (`ESTAGIO_D`)
//! 4. janela de colheita (`JAN_COL`), sauf si la colonne existe déjà
//! 5. date d'image unique pour toute la collection
//! 6. validation des ensembles fermés
//!
//! Les conversions de nombres et de dates ratées ne sont pas fatales ; elles
//! sont comptées dans le [`CoercionReport`] retourné.

mod codes;
mod columns;
mod contrato;
mod estagio;
mod janela;
mod validation;

pub use codes::{ContratoCode, EstagioCode, JanelaCode, GRIDCODES};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use geo::Geometry;
use ndvi_geo::{Feature, FeatureCollection, Field, FieldKind, Schema, Value};
use tracing::{debug, info};

use crate::coerce::CoercionReport;
use crate::error::ClassifyError;
use columns::Columns;

/// Ligne classifiée, prête pour l'agrégation
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRow {
    pub fazenda: String,
    pub variedade: String,
    pub estagio: EstagioCode,
    pub tp_prop: ContratoCode,
    pub jan_col: JanelaCode,
    pub gridcode: i64,
    pub data_img: Option<NaiveDate>,
    pub area_ndvi: f64,
}

/// Résultat de la classification d'une collection
#[derive(Debug, Clone)]
pub struct Classified {
    pub rows: Vec<ClassifiedRow>,
    /// Géométries, alignées sur `rows`
    pub geometries: Vec<Geometry>,
    pub epsg: u32,
    pub coercion: CoercionReport,
}

impl Classified {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_area(&self) -> f64 {
        self.rows.iter().map(|r| r.area_ndvi).sum()
    }

    /// Collection des lignes classifiées (export GeoJSON)
    pub fn to_collection(&self) -> FeatureCollection {
        let schema = Schema::new(vec![
            Field::new("FAZENDA", FieldKind::Text),
            Field::new("VARIEDADE", FieldKind::Text),
            Field::new("ESTAGIO_D", FieldKind::Text),
            Field::new("TP_PROP", FieldKind::Text),
            Field::new("JAN_COL", FieldKind::Text),
            Field::new("GRIDCODE", FieldKind::Integer),
            Field::new("DATA_IMG", FieldKind::Date),
            Field::new("AREA_NDVI", FieldKind::Number),
        ]);
        let mut collection = FeatureCollection::new(schema, self.epsg);
        for (row, geometry) in self.rows.iter().zip(&self.geometries) {
            collection.push(
                geometry.clone(),
                vec![
                    row.fazenda.as_str().into(),
                    row.variedade.as_str().into(),
                    row.estagio.as_str().into(),
                    row.tp_prop.as_str().into(),
                    row.jan_col.as_str().into(),
                    row.gridcode.into(),
                    row.data_img.map(Value::Date).unwrap_or_default(),
                    row.area_ndvi.into(),
                ],
            );
        }
        collection
    }
}

/// Ligne en cours de classification
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub fazenda: String,
    pub variedade: String,
    /// Estágio source, sans `Â` ni espaces
    pub estagio: Option<String>,
    pub desc_cana: Option<String>,
    pub tp_prop: Option<String>,
    pub estagio_d: Option<EstagioCode>,
    pub jan_col: Option<JanelaCode>,
    /// Valeur amont de `JAN_COL`, conservée pour le message d'erreur
    pub jan_col_source: Option<String>,
    /// Gridcode entier, ou le texte qui n'a pas pu être converti
    pub gridcode: Result<i64, String>,
    pub idade_img: Option<i64>,
    pub data_img: Option<NaiveDate>,
    pub dt_ult_cor: Option<NaiveDate>,
    pub area_ndvi: f64,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            fazenda: String::new(),
            variedade: String::new(),
            estagio: None,
            desc_cana: None,
            tp_prop: None,
            estagio_d: None,
            jan_col: None,
            jan_col_source: None,
            gridcode: Err(String::new()),
            idade_img: None,
            data_img: None,
            dt_ult_cor: None,
            area_ndvi: 0.0,
        }
    }
}

fn text(value: &Value) -> Option<String> {
    if value.is_blank() {
        None
    } else {
        Some(value.to_string().trim().to_string())
    }
}

/// Gridcode en entier : entiers, flottants entiers, texte numérique
fn gridcode(value: &Value) -> Result<i64, String> {
    let integral = |n: f64| (n.is_finite() && n.fract() == 0.0).then_some(n as i64);
    let code = match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) => integral(*n),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Value::Null | Value::Date(_) => None,
    };
    code.ok_or_else(|| value.to_string())
}

impl Draft {
    fn read(feature: &Feature, columns: &Columns, coercion: &mut CoercionReport) -> Self {
        let value = |index: usize| feature.value(index);

        let jan_col_source = columns.jan_col.and_then(|i| text(value(i)));
        Self {
            fazenda: text(value(columns.fazenda)).unwrap_or_default(),
            variedade: text(value(columns.variedade)).unwrap_or_default(),
            estagio: text(value(columns.estagio)).map(|s| s.replace(['Â', ' '], "")),
            desc_cana: text(value(columns.desc_cana)),
            tp_prop: text(value(columns.tp_prop)),
            estagio_d: None,
            jan_col: jan_col_source.as_deref().and_then(JanelaCode::parse_lenient),
            jan_col_source,
            gridcode: gridcode(value(columns.gridcode)),
            idade_img: coercion
                .number("IDADE_IMG", value(columns.idade_img))
                .map(|n| n.trunc() as i64),
            data_img: coercion.date("DATA_IMG", value(columns.data_img)),
            dt_ult_cor: coercion.date("DT_ULT_COR", value(columns.dt_ult_cor)),
            area_ndvi: coercion
                .number("AREA_NDVI", value(columns.area_ndvi))
                .unwrap_or(0.0),
        }
    }
}

/// Classifie une collection d'intersection NDVI de la safra `safra`
pub fn classify(collection: &FeatureCollection, safra: i32) -> Result<Classified, ClassifyError> {
    let columns = Columns::resolve(&collection.schema, safra)?;

    let mut coercion = CoercionReport::default();
    let mut drafts: Vec<Draft> = collection
        .features
        .iter()
        .map(|f| Draft::read(f, &columns, &mut coercion))
        .collect();

    contrato::classify(&mut drafts);
    estagio::classify(&mut drafts);
    if columns.jan_col.is_none() {
        janela::classify(&mut drafts);
    } else {
        debug!("Keeping upstream JAN_COL column");
    }

    let image_date = dominant_image_date(&drafts);
    for draft in &mut drafts {
        draft.data_img = image_date;
    }
    debug!(image_date = ?image_date, "Image date resolved");

    let rows = validation::validate(drafts)?;
    let geometries = collection
        .features
        .iter()
        .map(|f| f.geometry.clone())
        .collect();

    info!(
        rows = rows.len(),
        coercion_failures = coercion.total_failures(),
        "Classification done"
    );

    Ok(Classified {
        rows,
        geometries,
        epsg: collection.epsg,
        coercion,
    })
}

/// Date d'image couvrant la plus grande surface NDVI ; à égalité, la plus ancienne
///
/// Les lignes sans date votent ensemble et passent avant toute date : si
/// elles l'emportent, l'unité entière reste sans date.
fn dominant_image_date(drafts: &[Draft]) -> Option<NaiveDate> {
    let mut totals: BTreeMap<Option<NaiveDate>, f64> = BTreeMap::new();
    for draft in drafts {
        *totals.entry(draft.data_img).or_default() += draft.area_ndvi;
    }

    totals
        .into_iter()
        .fold(None, |best: Option<(Option<NaiveDate>, f64)>, (date, area)| match best {
            Some((_, best_area)) if best_area >= area => best,
            _ => Some((date, area)),
        })
        .and_then(|(date, _)| date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(date: Option<NaiveDate>, area: f64) -> Draft {
        Draft {
            data_img: date,
            area_ndvi: area,
            ..Draft::default()
        }
    }

    #[test]
    fn test_gridcode_coercion() {
        assert_eq!(gridcode(&Value::Integer(3)), Ok(3));
        assert_eq!(gridcode(&Value::Number(4.0)), Ok(4));
        assert_eq!(gridcode(&Value::from(" 5 ")), Ok(5));
        assert_eq!(gridcode(&Value::from("2.0")), Ok(2));
        assert_eq!(gridcode(&Value::Number(2.5)), Err("2.5".to_string()));
        assert_eq!(gridcode(&Value::Null), Err(String::new()));
    }

    #[test]
    fn test_dominant_image_date() {
        let drafts = vec![
            draft(Some(ymd(2025, 3, 1)), 2.0),
            draft(Some(ymd(2025, 3, 9)), 1.5),
            draft(Some(ymd(2025, 3, 9)), 1.0),
            draft(None, 0.5),
        ];
        assert_eq!(dominant_image_date(&drafts), Some(ymd(2025, 3, 9)));
    }

    #[test]
    fn test_missing_image_dates_vote_together() {
        let drafts = vec![
            draft(Some(ymd(2025, 3, 1)), 3.0),
            draft(None, 2.0),
            draft(None, 2.0),
        ];
        assert_eq!(dominant_image_date(&drafts), None);

        // À égalité, l'absence de date passe avant la plus ancienne date
        let tied = vec![draft(Some(ymd(2025, 3, 1)), 2.0), draft(None, 2.0)];
        assert_eq!(dominant_image_date(&tied), None);
    }

    #[test]
    fn test_dominant_image_date_tie_takes_earliest() {
        let drafts = vec![
            draft(Some(ymd(2025, 4, 2)), 3.0),
            draft(Some(ymd(2025, 3, 1)), 3.0),
        ];
        assert_eq!(dominant_image_date(&drafts), Some(ymd(2025, 3, 1)));
        assert_eq!(dominant_image_date(&[draft(None, 1.0)]), None);
    }

    fn intersect_collection() -> FeatureCollection {
        let names = [
            ("fazenda", FieldKind::Text),
            ("variedade", FieldKind::Text),
            ("estagio_25", FieldKind::Text),
            ("desc_cana", FieldKind::Text),
            ("tp_prop", FieldKind::Text),
            ("gridcode", FieldKind::Integer),
            ("idade_img", FieldKind::Integer),
            ("data_img", FieldKind::Date),
            ("dt_ult_cor", FieldKind::Date),
            ("area_ndvi", FieldKind::Number),
        ];
        let schema = Schema::new(names.iter().map(|(n, k)| Field::new(*n, *k)).collect());
        let mut fc = FeatureCollection::new(schema, 4326);
        let square = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]);
        let mut row = |estagio: &str, tp: &str, cut: Option<NaiveDate>, img: NaiveDate, area: f64| {
            fc.push(
                square.clone(),
                vec![
                    "FAZ1".into(),
                    "VAR1".into(),
                    estagio.into(),
                    Value::Null,
                    tp.into(),
                    3i64.into(),
                    9i64.into(),
                    img.into(),
                    cut.map(Value::Date).unwrap_or_default(),
                    area.into(),
                ],
            );
        };
        row("2º CORTE", "PROPRIA", Some(ymd(2024, 5, 10)), ymd(2025, 3, 1), 2.0);
        row("12M", "Fornecedores", None, ymd(2025, 3, 9), 5.0);
        row("3°C", "", None, ymd(2025, 3, 1), 1.0);
        fc
    }

    #[test]
    fn test_classify_end_to_end() {
        let classified = classify(&intersect_collection(), 2025).unwrap();
        assert_eq!(classified.len(), 3);
        assert_eq!(classified.geometries.len(), 3);

        let r = &classified.rows;
        assert_eq!(r[0].estagio, EstagioCode::SecondCut);
        assert_eq!(r[0].tp_prop, ContratoCode::Proprias);
        assert_eq!(r[0].jan_col, JanelaCode::Inicio);

        assert_eq!(r[1].estagio, EstagioCode::FirstCut);
        assert_eq!(r[1].tp_prop, ContratoCode::Fornecedores);
        assert_eq!(r[1].jan_col, JanelaCode::Tardia);

        assert_eq!(r[2].estagio, EstagioCode::ThirdCut);
        // deux contrats distincts : les vides deviennent ADEF
        assert_eq!(r[2].tp_prop, ContratoCode::Adef);
        // ni estágio connu ni date de coupe : IDADE_IMG = 9
        assert_eq!(r[2].jan_col, JanelaCode::Media);

        // 5.0 ha le 09/03 contre 3.0 ha le 01/03
        assert!(r.iter().all(|row| row.data_img == Some(ymd(2025, 3, 9))));
        assert_eq!(r[0].gridcode, 3);
        assert!(classified.coercion.is_clean());
    }

    #[test]
    fn test_classify_reports_invalid_stage() {
        let mut fc = intersect_collection();
        fc.features[1].values[2] = "XPTO".into();
        match classify(&fc, 2025) {
            Err(ClassifyError::InvalidClassificationValue { column, values }) => {
                assert_eq!(column, "ESTAGIO_D");
                assert_eq!(values, vec!["XPTO"]);
            }
            other => panic!("unexpected: {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_to_collection() {
        let classified = classify(&intersect_collection(), 2025).unwrap();
        let fc = classified.to_collection();
        assert_eq!(fc.len(), 3);
        let idx = fc.column("ESTAGIO_D").unwrap();
        assert_eq!(fc.features[0].values[idx], Value::from("2ºC"));
    }
}
