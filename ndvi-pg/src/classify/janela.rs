//! Janela de colheita (`JAN_COL`)

use chrono::Datelike;

use super::{Draft, JanelaCode};

fn from_estagio(stage: &str) -> Option<JanelaCode> {
    match stage {
        "12M" => Some(JanelaCode::Tardia),
        "15M" => Some(JanelaCode::Media),
        "18M" | "2VER" => Some(JanelaCode::Inicio),
        _ => None,
    }
}

fn from_cut_month(month: u32) -> Option<JanelaCode> {
    match month {
        1..=6 => Some(JanelaCode::Inicio),
        7..=8 => Some(JanelaCode::Media),
        9..=12 => Some(JanelaCode::Tardia),
        _ => None,
    }
}

fn from_idade(idade: i64) -> JanelaCode {
    match idade {
        i if i > 10 => JanelaCode::Inicio,
        8..=10 => JanelaCode::Media,
        _ => JanelaCode::Tardia,
    }
}

fn window(draft: &Draft) -> Option<JanelaCode> {
    let mut jan = draft.estagio.as_deref().and_then(from_estagio);

    if matches!(draft.desc_cana.as_deref(), Some("BIS" | "BISADA")) {
        jan = Some(JanelaCode::Inicio);
    }

    let cut_month = match (jan, draft.dt_ult_cor) {
        (None, Some(date)) => date.month(),
        _ => 0,
    };
    if jan.is_none() {
        jan = from_cut_month(cut_month);
    }

    if jan.is_none() && cut_month == 0 {
        jan = draft.idade_img.map(from_idade);
    }
    jan
}

pub(super) fn classify(drafts: &mut [Draft]) {
    for draft in drafts.iter_mut() {
        draft.jan_col = window(draft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft(estagio: &str, desc: Option<&str>, cut: Option<(i32, u32)>, idade: Option<i64>) -> Draft {
        Draft {
            estagio: Some(estagio.to_string()),
            desc_cana: desc.map(str::to_string),
            dt_ult_cor: cut.and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 15)),
            idade_img: idade,
            ..Draft::default()
        }
    }

    #[test]
    fn test_from_estagio() {
        assert_eq!(window(&draft("12M", None, Some((2024, 2)), None)), Some(JanelaCode::Tardia));
        assert_eq!(window(&draft("15M", None, None, None)), Some(JanelaCode::Media));
        assert_eq!(window(&draft("2VER", None, None, None)), Some(JanelaCode::Inicio));
    }

    #[test]
    fn test_bisada_overrides_estagio() {
        assert_eq!(
            window(&draft("12M", Some("BISADA"), None, None)),
            Some(JanelaCode::Inicio)
        );
    }

    #[test]
    fn test_cut_month_buckets() {
        assert_eq!(window(&draft("3ºC", None, Some((2024, 6)), None)), Some(JanelaCode::Inicio));
        assert_eq!(window(&draft("3ºC", None, Some((2024, 8)), Some(20))), Some(JanelaCode::Media));
        assert_eq!(window(&draft("3ºC", None, Some((2024, 11)), None)), Some(JanelaCode::Tardia));
    }

    #[test]
    fn test_idade_fallback() {
        assert_eq!(window(&draft("3ºC", None, None, Some(11))), Some(JanelaCode::Inicio));
        assert_eq!(window(&draft("3ºC", None, None, Some(8))), Some(JanelaCode::Media));
        assert_eq!(window(&draft("3ºC", None, None, Some(7))), Some(JanelaCode::Tardia));
        assert_eq!(window(&draft("3ºC", None, None, None)), None);
    }
}
