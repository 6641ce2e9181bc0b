//! Énumérations fermées produites par la classification

use std::fmt;

use serde::Serialize;

/// Estágio dérivé (`ESTAGIO_D`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EstagioCode {
    #[serde(rename = "1ºC")]
    FirstCut,
    #[serde(rename = "2ºC")]
    SecondCut,
    #[serde(rename = "3ºC")]
    ThirdCut,
    #[serde(rename = "4ºC")]
    FourthCut,
    #[serde(rename = "5ºC+")]
    FifthCutPlus,
    #[serde(rename = "BIS")]
    Bis,
    #[serde(rename = "ADEF")]
    Adef,
    #[serde(rename = "REF")]
    Ref,
    #[serde(rename = "PLANTIO")]
    Plantio,
}

impl EstagioCode {
    pub const ALL: [EstagioCode; 9] = [
        EstagioCode::FirstCut,
        EstagioCode::SecondCut,
        EstagioCode::ThirdCut,
        EstagioCode::FourthCut,
        EstagioCode::FifthCutPlus,
        EstagioCode::Bis,
        EstagioCode::Adef,
        EstagioCode::Ref,
        EstagioCode::Plantio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EstagioCode::FirstCut => "1ºC",
            EstagioCode::SecondCut => "2ºC",
            EstagioCode::ThirdCut => "3ºC",
            EstagioCode::FourthCut => "4ºC",
            EstagioCode::FifthCutPlus => "5ºC+",
            EstagioCode::Bis => "BIS",
            EstagioCode::Adef => "ADEF",
            EstagioCode::Ref => "REF",
            EstagioCode::Plantio => "PLANTIO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == s)
    }
}

/// Type de contrat (`TP_PROP`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContratoCode {
    #[serde(rename = "PRÓPRIAS")]
    Proprias,
    #[serde(rename = "FORNECEDORES")]
    Fornecedores,
    #[serde(rename = "ADEF")]
    Adef,
}

impl ContratoCode {
    pub const ALL: [ContratoCode; 3] = [
        ContratoCode::Proprias,
        ContratoCode::Fornecedores,
        ContratoCode::Adef,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContratoCode::Proprias => "PRÓPRIAS",
            ContratoCode::Fornecedores => "FORNECEDORES",
            ContratoCode::Adef => "ADEF",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == s)
    }
}

/// Janela de colheita (`JAN_COL`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JanelaCode {
    #[serde(rename = "INÍCIO")]
    Inicio,
    #[serde(rename = "MÉDIA")]
    Media,
    #[serde(rename = "TARDIA")]
    Tardia,
}

impl JanelaCode {
    pub const ALL: [JanelaCode; 3] = [JanelaCode::Inicio, JanelaCode::Media, JanelaCode::Tardia];

    pub fn as_str(self) -> &'static str {
        match self {
            JanelaCode::Inicio => "INÍCIO",
            JanelaCode::Media => "MÉDIA",
            JanelaCode::Tardia => "TARDIA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_str() == s)
    }

    /// Lecture d'une valeur amont : casse et accents ignorés
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "INÍCIO" | "INICIO" => Some(JanelaCode::Inicio),
            "MÉDIA" | "MEDIA" => Some(JanelaCode::Media),
            "TARDIA" => Some(JanelaCode::Tardia),
            _ => None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(EstagioCode, ContratoCode, JanelaCode);

/// Gridcodes valides de l'image NDVI
pub const GRIDCODES: std::ops::RangeInclusive<i64> = 1..=6;
