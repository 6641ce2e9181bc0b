//! Résolution des colonnes du shapefile d'intersection
//!
//! Les noms sont comparés en majuscules. Trois colonnes dérivées acceptent
//! des alias, essayés dans l'ordre ; la première présente l'emporte.

use ndvi_geo::Schema;

use crate::error::ClassifyError;

/// Position des colonnes utilisées par la classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Columns {
    pub estagio: usize,
    pub data_img: usize,
    pub dt_ult_cor: usize,
    pub desc_cana: usize,
    pub gridcode: usize,
    pub idade_img: usize,
    pub tp_prop: usize,
    pub area_ndvi: usize,
    pub fazenda: usize,
    pub variedade: usize,
    /// Janela déjà classifiée en amont
    pub jan_col: Option<usize>,
}

/// Alias de `ESTAGIO` : la colonne de la safra prime
pub(crate) fn estagio_aliases(safra: i32) -> Vec<String> {
    vec![format!("ESTAGIO_{:02}", safra % 100), "ESTAGIO".to_string()]
}

pub(crate) fn data_img_aliases() -> Vec<String> {
    ["DATA_IMG", "DT_IMAGEM", "DT_IMG"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Alias de `DT_ULT_COR` ; `CORTE_<yy-1>` n'est pas complété par un zéro
pub(crate) fn dt_ult_cor_aliases(safra: i32) -> Vec<String> {
    vec![
        "DT_ULT_COR".to_string(),
        "ULT_CORTE".to_string(),
        format!("CORTE_{}", safra % 100 - 1),
    ]
}

impl Columns {
    pub fn resolve(schema: &Schema, safra: i32) -> Result<Self, ClassifyError> {
        let mut upper = schema.clone();
        upper.rename_all(|name| name.to_uppercase());

        let aliased = |column: &str, candidates: Vec<String>| {
            let found = candidates.iter().find_map(|name| upper.index_of(name));
            found.ok_or_else(|| ClassifyError::MissingRequiredColumn {
                column: column.to_string(),
                candidates,
            })
        };
        let required = |column: &str| aliased(column, vec![column.to_string()]);

        Ok(Self {
            estagio: aliased("ESTAGIO", estagio_aliases(safra))?,
            data_img: aliased("DATA_IMG", data_img_aliases())?,
            dt_ult_cor: aliased("DT_ULT_COR", dt_ult_cor_aliases(safra))?,
            desc_cana: required("DESC_CANA")?,
            gridcode: required("GRIDCODE")?,
            idade_img: required("IDADE_IMG")?,
            tp_prop: required("TP_PROP")?,
            area_ndvi: required("AREA_NDVI")?,
            fazenda: required("FAZENDA")?,
            variedade: required("VARIEDADE")?,
            jan_col: upper.index_of("JAN_COL"),
        })
    }
}
