//! Type de contrat (`TP_PROP`)

use std::collections::BTreeSet;

use super::{ContratoCode, Draft};

const PROPRIAS: [&str; 9] = [
    "1-SETOR A PROPRIA",
    "Próprio",
    "AGRICOLA CASE",
    "2-PARCERIA",
    "PROPRIA",
    "SUBPARCERIA",
    "ARRENDAMENTO",
    "COMPRA DE CANA",
    "ARRE",
];

const FORNECEDORES: [&str; 6] = [
    "Fornecedores",
    "3-FORNECEDOR",
    "6-FRANQUIA",
    "FORNEC.C",
    "FORNEC.S",
    "SPOT",
];

/// Classe une valeur source non vide
///
/// Une valeur qui ne correspond à rien est conservée telle quelle, la
/// validation la rejettera.
fn normalize(raw: &str) -> String {
    if raw.starts_with('P') || PROPRIAS.contains(&raw) {
        ContratoCode::Proprias.to_string()
    } else if raw.starts_with('F') || FORNECEDORES.contains(&raw) {
        ContratoCode::Fornecedores.to_string()
    } else {
        raw.to_string()
    }
}

pub(super) fn classify(drafts: &mut [Draft]) {
    for draft in drafts.iter_mut() {
        draft.tp_prop = draft.tp_prop.as_deref().map(normalize);
    }

    let distinct: BTreeSet<&str> = drafts.iter().filter_map(|d| d.tp_prop.as_deref()).collect();
    let fill = match distinct.len() {
        1 => distinct.into_iter().next().map(str::to_string),
        _ => None,
    }
    .unwrap_or_else(|| ContratoCode::Adef.to_string());

    for draft in drafts.iter_mut().filter(|d| d.tp_prop.is_none()) {
        draft.tp_prop = Some(fill.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drafts(values: &[Option<&str>]) -> Vec<Draft> {
        values
            .iter()
            .map(|v| Draft {
                tp_prop: v.map(str::to_string),
                ..Draft::default()
            })
            .collect()
    }

    fn tp(drafts: &[Draft]) -> Vec<&str> {
        drafts.iter().map(|d| d.tp_prop.as_deref().unwrap_or("")).collect()
    }

    #[test]
    fn test_lists_and_prefixes() {
        let mut d = drafts(&[
            Some("ARRENDAMENTO"),
            Some("Próprio"),
            Some("PARCEIRO"),
            Some("SPOT"),
            Some("FORNEC.S"),
            Some("6-FRANQUIA"),
            Some("OUTRO"),
        ]);
        classify(&mut d);
        assert_eq!(
            tp(&d),
            vec![
                "PRÓPRIAS",
                "PRÓPRIAS",
                "PRÓPRIAS",
                "FORNECEDORES",
                "FORNECEDORES",
                "FORNECEDORES",
                "OUTRO"
            ]
        );
    }

    #[test]
    fn test_fill_with_single_value() {
        let mut d = drafts(&[Some("PROPRIA"), None, Some("2-PARCERIA")]);
        classify(&mut d);
        assert_eq!(tp(&d), vec!["PRÓPRIAS"; 3]);
    }

    #[test]
    fn test_fill_with_adef() {
        let mut d = drafts(&[Some("PROPRIA"), None, Some("SPOT")]);
        classify(&mut d);
        assert_eq!(tp(&d)[1], "ADEF");

        let mut d = drafts(&[None, None]);
        classify(&mut d);
        assert_eq!(tp(&d), vec!["ADEF", "ADEF"]);
    }
}
