//! Estágio dérivé (`ESTAGIO_D`)
//!
//! Les règles s'appliquent dans l'ordre : ADEF, PLANTIO, REF, BIS, 1ºC,
//! 2ºC à 4ºC, puis 5ºC+. Chaque règle qui correspond écrase le résultat
//! des précédentes. La valeur source est déjà débarrassée de `Â` et des
//! espaces.

use std::sync::LazyLock;

use super::{Draft, EstagioCode};

const ADEF: [&str; 5] = ["", "EXP", "POU", "POUSIO", "ADEF"];
const PLANTIO: [&str; 4] = ["12MF", "15MF", "18MF", "9MF"];
const BIS: [&str; 5] = ["BIS", "BISADA", "BISANOEMEIO", "SOQUEIRA", "SOQ"];

const FIRST_CUT: [&str; 11] = [
    "9M", "10M", "11M", "12M", "13M", "14M", "15M", "16M", "17M", "18M", "2VER",
];

/// Écritures d'un numéro de coupe (sans espaces)
const CUT_SUFFIXES: [&str; 6] = ["ºC", "°C", "º", "°", "ºCORTE", "°CORTE"];

/// 5ºC et au-delà acceptent aussi `ºC+` et `°C+`
static FIFTH_PLUS_SUFFIXES: [&str; 8] = ["ºC", "°C", "º", "°", "ºCORTE", "°CORTE", "ºC+", "°C+"];

static FIFTH_PLUS: LazyLock<Vec<String>> = LazyLock::new(|| {
    (5..=30)
        .flat_map(|n| {
            FIFTH_PLUS_SUFFIXES
                .iter()
                .map(move |suffix| format!("{}{}", n, suffix))
        })
        .collect()
});

fn is_cut(stage: &str, n: u32) -> bool {
    stage
        .strip_prefix(&n.to_string())
        .is_some_and(|suffix| CUT_SUFFIXES.contains(&suffix))
}

/// Estágio dérivé d'une valeur source ; `None` si rien ne correspond
pub(crate) fn derive(stage: Option<&str>) -> Option<EstagioCode> {
    let Some(stage) = stage else {
        return Some(EstagioCode::Adef);
    };

    let mut derived = None;
    if ADEF.contains(&stage) {
        derived = Some(EstagioCode::Adef);
    }
    if PLANTIO.contains(&stage) {
        derived = Some(EstagioCode::Plantio);
    }
    if stage == "REF" {
        derived = Some(EstagioCode::Ref);
    }
    if stage.ends_with('B') || stage.ends_with("BIS") || BIS.contains(&stage) {
        derived = Some(EstagioCode::Bis);
    }
    if FIRST_CUT.contains(&stage) {
        derived = Some(EstagioCode::FirstCut);
    }

    let numbered = [
        (2, EstagioCode::SecondCut),
        (3, EstagioCode::ThirdCut),
        (4, EstagioCode::FourthCut),
    ];
    for (n, code) in numbered {
        if is_cut(stage, n) {
            derived = Some(code);
        }
    }

    if stage.starts_with('>') || FIFTH_PLUS.iter().any(|v| v == stage) {
        derived = Some(EstagioCode::FifthCutPlus);
    }
    derived
}

pub(super) fn classify(drafts: &mut [Draft]) {
    for draft in drafts.iter_mut() {
        draft.estagio_d = derive(draft.estagio.as_deref());
    }
}
