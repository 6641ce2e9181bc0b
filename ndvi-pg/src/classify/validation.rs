//! Contrôle des ensembles fermés avant agrégation

use super::{ClassifiedRow, ContratoCode, Draft, GRIDCODES};
use crate::error::ClassifyError;

/// Valeurs fautives distinctes, dans l'ordre d'apparition
#[derive(Default)]
struct Offending(Vec<String>);

impl Offending {
    fn push(&mut self, value: String) {
        if !self.0.contains(&value) {
            self.0.push(value);
        }
    }
}

/// Convertit les brouillons en lignes typées, ou signale la première colonne fautive
///
/// Les colonnes sont contrôlées dans l'ordre `ESTAGIO_D`, `GRIDCODE`,
/// `TP_PROP`, `JAN_COL`. Pour `ESTAGIO_D` la valeur rapportée est
/// l'estágio source.
pub(super) fn validate(drafts: Vec<Draft>) -> Result<Vec<ClassifiedRow>, ClassifyError> {
    let mut estagio = Offending::default();
    let mut gridcode = Offending::default();
    let mut tp_prop = Offending::default();
    let mut jan_col = Offending::default();

    for draft in &drafts {
        if draft.estagio_d.is_none() {
            estagio.push(draft.estagio.clone().unwrap_or_default());
        }
        match &draft.gridcode {
            Ok(code) if GRIDCODES.contains(code) => {}
            Ok(code) => gridcode.push(code.to_string()),
            Err(raw) => gridcode.push(raw.clone()),
        }
        let tp = draft.tp_prop.as_deref().unwrap_or_default();
        if ContratoCode::parse(tp).is_none() {
            tp_prop.push(tp.to_string());
        }
        if draft.jan_col.is_none() {
            jan_col.push(draft.jan_col_source.clone().unwrap_or_default());
        }
    }

    for (column, offending) in [
        ("ESTAGIO_D", estagio),
        ("GRIDCODE", gridcode),
        ("TP_PROP", tp_prop),
        ("JAN_COL", jan_col),
    ] {
        if !offending.0.is_empty() {
            return Err(ClassifyError::InvalidClassificationValue {
                column: column.to_string(),
                values: offending.0,
            });
        }
    }

    let rows = drafts
        .into_iter()
        .filter_map(|d| {
            Some(ClassifiedRow {
                estagio: d.estagio_d?,
                tp_prop: ContratoCode::parse(d.tp_prop.as_deref()?)?,
                jan_col: d.jan_col?,
                gridcode: d.gridcode.ok()?,
                fazenda: d.fazenda,
                variedade: d.variedade,
                data_img: d.data_img,
                area_ndvi: d.area_ndvi,
            })
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{EstagioCode, JanelaCode};

    fn valid() -> Draft {
        Draft {
            estagio: Some("2ºC".into()),
            estagio_d: Some(EstagioCode::SecondCut),
            tp_prop: Some("PRÓPRIAS".into()),
            jan_col: Some(JanelaCode::Media),
            gridcode: Ok(4),
            area_ndvi: 1.5,
            ..Draft::default()
        }
    }

    fn error_of(drafts: Vec<Draft>) -> (String, Vec<String>) {
        match validate(drafts) {
            Err(ClassifyError::InvalidClassificationValue { column, values }) => (column, values),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_valid_rows() {
        let rows = validate(vec![valid(), valid()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gridcode, 4);
        assert_eq!(rows[0].tp_prop, ContratoCode::Proprias);
    }

    #[test]
    fn test_distinct_values_first_seen_order() {
        let bad = |stage: &str| Draft {
            estagio: Some(stage.into()),
            estagio_d: None,
            ..valid()
        };
        let (column, values) = error_of(vec![bad("ZZ"), valid(), bad("AA"), bad("ZZ")]);
        assert_eq!(column, "ESTAGIO_D");
        assert_eq!(values, vec!["ZZ", "AA"]);
    }

    #[test]
    fn test_gridcode_out_of_range() {
        let (column, values) = error_of(vec![
            Draft { gridcode: Ok(7), ..valid() },
            Draft { gridcode: Err("2.5".into()), ..valid() },
        ]);
        assert_eq!(column, "GRIDCODE");
        assert_eq!(values, vec!["7", "2.5"]);
    }

    #[test]
    fn test_contract_then_window() {
        let (column, values) = error_of(vec![Draft {
            tp_prop: Some("OUTRO".into()),
            jan_col: None,
            ..valid()
        }]);
        assert_eq!(column, "TP_PROP");
        assert_eq!(values, vec!["OUTRO"]);

        let (column, values) = error_of(vec![Draft {
            jan_col: None,
            jan_col_source: Some("CEDO".into()),
            ..valid()
        }]);
        assert_eq!(column, "JAN_COL");
        assert_eq!(values, vec!["CEDO"]);
    }
}
