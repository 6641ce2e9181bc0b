//! Agrégation en deux phases des lignes classifiées
//!
//! - phase 1 : une ligne par talhão agrégé ([`FieldKey`])
//! - phase 2 : une ligne par clé d'entrepôt ([`WarehouseKey`])
//!
//! La phase 2 regroupe sur huit champs alors que sa clé n'en contient que
//! six : deux lignes de même clé peuvent coexister si leur contrat ou leur
//! date d'image diffèrent.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::{ClassifiedRow, ContratoCode, EstagioCode, JanelaCode};

/// Clé de phase 1 : `fazenda_gridcode_estagio_tpprop_variedade_jancol_safra_janela`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldKey(String);

/// Clé de phase 2 : `client_safra_janela_estagio_jancol_gridcode`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WarehouseKey(String);

impl FieldKey {
    pub fn new(row: &ClassifiedRow, safra: i32, janela: &str) -> Self {
        Self(format!(
            "{}_{}_{}_{}_{}_{}_{}_{}",
            row.fazenda, row.gridcode, row.estagio, row.tp_prop, row.variedade, row.jan_col, safra, janela
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl WarehouseKey {
    pub fn new(
        client_id: i64,
        safra: i32,
        janela: &str,
        estagio: EstagioCode,
        jan_col: JanelaCode,
        gridcode: i64,
    ) -> Self {
        Self(format!(
            "{}_{}_{}_{}_{}_{}",
            client_id, safra, janela, estagio, jan_col, gridcode
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for WarehouseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ligne de phase 1
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub key: FieldKey,
    pub fazenda: String,
    pub variedade: String,
    pub gridcode: i64,
    pub estagio: EstagioCode,
    pub tp_prop: ContratoCode,
    pub jan_col: JanelaCode,
    pub safra: i32,
    pub janela: String,
    pub data_img: Option<NaiveDate>,
    pub area_ndvi: f64,
}

/// Ligne de l'entrepôt (`powerbi.intersect_ndvi`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseRow {
    pub client_id: i64,
    /// Renseigné au chargement
    pub client_name: String,
    pub chave: WarehouseKey,
    pub safra: i32,
    pub janela: String,
    pub estagio: EstagioCode,
    pub jan_col: JanelaCode,
    pub gridcode: i64,
    pub tp_prop: ContratoCode,
    pub data_img: Option<NaiveDate>,
    pub area_ndvi: f64,
}

/// Phase 1, triée par clé
///
/// Les attributs sont ceux de la première ligne du groupe, la date d'image
/// la première non nulle ; les surfaces sont sommées.
pub fn summarize_fields(rows: &[ClassifiedRow], safra: i32, janela: &str) -> Vec<FieldSummary> {
    let mut groups: BTreeMap<FieldKey, FieldSummary> = BTreeMap::new();

    for row in rows {
        let key = FieldKey::new(row, safra, janela);
        let summary = groups.entry(key.clone()).or_insert_with(|| FieldSummary {
            key,
            fazenda: row.fazenda.clone(),
            variedade: row.variedade.clone(),
            gridcode: row.gridcode,
            estagio: row.estagio,
            tp_prop: row.tp_prop,
            jan_col: row.jan_col,
            safra,
            janela: janela.to_string(),
            data_img: None,
            area_ndvi: 0.0,
        });
        summary.data_img = summary.data_img.or(row.data_img);
        summary.area_ndvi += row.area_ndvi;
    }

    groups.into_values().collect()
}

type WarehouseGroup = (
    WarehouseKey,
    i32,
    String,
    &'static str,
    &'static str,
    i64,
    &'static str,
    Option<NaiveDate>,
);

/// Phase 2, triée par groupe
pub fn summarize_warehouse(fields: &[FieldSummary], client_id: i64) -> Vec<WarehouseRow> {
    let mut groups: BTreeMap<WarehouseGroup, WarehouseRow> = BTreeMap::new();

    for field in fields {
        let chave = WarehouseKey::new(
            client_id,
            field.safra,
            &field.janela,
            field.estagio,
            field.jan_col,
            field.gridcode,
        );
        let group = (
            chave.clone(),
            field.safra,
            field.janela.clone(),
            field.estagio.as_str(),
            field.jan_col.as_str(),
            field.gridcode,
            field.tp_prop.as_str(),
            field.data_img,
        );
        let row = groups.entry(group).or_insert_with(|| WarehouseRow {
            client_id,
            client_name: String::new(),
            chave,
            safra: field.safra,
            janela: field.janela.clone(),
            estagio: field.estagio,
            jan_col: field.jan_col,
            gridcode: field.gridcode,
            tp_prop: field.tp_prop,
            data_img: field.data_img,
            area_ndvi: 0.0,
        });
        row.area_ndvi += field.area_ndvi;
    }

    groups.into_values().collect()
}

/// Surface NDVI totale
pub fn total_area<'a>(areas: impl IntoIterator<Item = &'a f64>) -> f64 {
    areas.into_iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(fazenda: &str, gridcode: i64, estagio: EstagioCode, tp: ContratoCode, area: f64) -> ClassifiedRow {
        ClassifiedRow {
            fazenda: fazenda.into(),
            variedade: "VAR1".into(),
            estagio,
            tp_prop: tp,
            jan_col: JanelaCode::Inicio,
            gridcode,
            data_img: NaiveDate::from_ymd_opt(2025, 3, 9),
            area_ndvi: area,
        }
    }

    #[test]
    fn test_phase1_example() {
        let rows: Vec<ClassifiedRow> = [2.0, 3.0, 1.5]
            .into_iter()
            .map(|a| row("FAZ1", 10, EstagioCode::FirstCut, ContratoCode::Proprias, a))
            .collect();

        let fields = summarize_fields(&rows, 2025, "J1");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].key.as_str(), "FAZ1_10_1ºC_PRÓPRIAS_VAR1_INÍCIO_2025_J1");
        assert_relative_eq!(fields[0].area_ndvi, 6.5);
    }

    #[test]
    fn test_phase1_sorted_and_first_date() {
        let mut late = row("FAZ2", 1, EstagioCode::Bis, ContratoCode::Adef, 1.0);
        late.data_img = None;
        let rows = vec![
            late,
            row("FAZ2", 1, EstagioCode::Bis, ContratoCode::Adef, 2.0),
            row("FAZ1", 1, EstagioCode::Bis, ContratoCode::Adef, 4.0),
        ];

        let fields = summarize_fields(&rows, 2025, "J2");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].fazenda, "FAZ1");
        assert_eq!(fields[1].data_img, NaiveDate::from_ymd_opt(2025, 3, 9));
        assert_relative_eq!(fields[1].area_ndvi, 3.0);
    }

    #[test]
    fn test_phase2_keeps_contract_split() {
        let rows = vec![
            row("FAZ1", 2, EstagioCode::SecondCut, ContratoCode::Proprias, 1.0),
            row("FAZ2", 2, EstagioCode::SecondCut, ContratoCode::Proprias, 2.0),
            row("FAZ3", 2, EstagioCode::SecondCut, ContratoCode::Fornecedores, 4.0),
        ];
        let fields = summarize_fields(&rows, 2025, "J1");
        let warehouse = summarize_warehouse(&fields, 7);

        assert_eq!(warehouse.len(), 2);
        assert!(warehouse.iter().all(|r| r.chave.as_str() == "7_2025_J1_2ºC_INÍCIO_2"));
        let proprias = warehouse
            .iter()
            .find(|r| r.tp_prop == ContratoCode::Proprias)
            .unwrap();
        assert_relative_eq!(proprias.area_ndvi, 3.0);
    }

    #[test]
    fn test_area_preserved() {
        let rows: Vec<ClassifiedRow> = (0..40)
            .map(|i| {
                let estagio = EstagioCode::ALL[i % EstagioCode::ALL.len()];
                let tp = ContratoCode::ALL[i % 3];
                row(&format!("FAZ{}", i % 5), (i % 6) as i64 + 1, estagio, tp, 0.25 * i as f64)
            })
            .collect();
        let input = total_area(rows.iter().map(|r| &r.area_ndvi));

        let fields = summarize_fields(&rows, 2024, "J3");
        let warehouse = summarize_warehouse(&fields, 1);

        assert_relative_eq!(total_area(fields.iter().map(|f| &f.area_ndvi)), input, epsilon = 1e-9);
        assert_relative_eq!(total_area(warehouse.iter().map(|r| &r.area_ndvi)), input, epsilon = 1e-9);
    }
}
