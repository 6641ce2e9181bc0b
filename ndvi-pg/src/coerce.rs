//! Conversion tolérante des attributs texte en nombres et dates
//!
//! Les échecs ne sont jamais fatals : la valeur devient absente et l'échec
//! est compté par colonne dans un [`CoercionReport`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ndvi_geo::Value;
use serde::Serialize;

/// Formats de date acceptés, dans l'ordre d'essai
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d",
];

/// Marqueurs de valeur absente (comparés en minuscules)
const MISSING_MARKERS: [&str; 8] = ["", "nan", "nat", "n/a", "null", "none", "-", "<na>"];

fn is_missing(s: &str) -> bool {
    let lower = s.to_lowercase();
    MISSING_MARKERS.contains(&lower.as_str())
}

/// Parse un nombre écrit à la française, à l'anglaise ou brut
///
/// `1.234,56` et `1,234.56` donnent tous deux `1234.56`, `12,5` donne `12.5`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if is_missing(s) {
        return None;
    }

    let normalized = match (s.find('.'), s.find(',')) {
        // le point précède la virgule : séparateur de milliers
        (Some(dot), Some(comma)) if dot < comma => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) => s.replace(',', "."),
        _ => s.to_string(),
    };

    let cleaned: String = normalized
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse une date ; une éventuelle partie horaire est ignorée
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if is_missing(s) {
        return None;
    }
    let day = s.split(['T', ' ']).next().unwrap_or(s);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

/// Comptage des conversions par colonne
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoercionReport {
    /// Valeurs converties avec succès
    pub converted: usize,
    /// Échecs par colonne
    pub failures: BTreeMap<String, usize>,
}

impl CoercionReport {
    /// Convertit `value` en nombre ; un texte non vide illisible est compté en échec
    pub fn number(&mut self, column: &str, value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Null => return None,
            Value::Number(n) if n.is_nan() => return None,
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) if is_missing(s.trim()) => return None,
            Value::Text(s) => parse_number(s),
            Value::Date(_) => None,
        };
        self.tally(column, parsed)
    }

    /// Convertit `value` en date ; un texte non vide illisible est compté en échec
    pub fn date(&mut self, column: &str, value: &Value) -> Option<NaiveDate> {
        let parsed = match value {
            Value::Null => return None,
            Value::Date(d) => Some(*d),
            Value::Text(s) if is_missing(s.trim()) => return None,
            Value::Text(s) => parse_date(s),
            Value::Integer(i) => parse_date(&i.to_string()),
            Value::Number(n) if n.is_nan() => return None,
            Value::Number(n) => parse_date(&format!("{}", n.trunc())),
        };
        self.tally(column, parsed)
    }

    fn tally<T>(&mut self, column: &str, parsed: Option<T>) -> Option<T> {
        match parsed {
            Some(_) => self.converted += 1,
            None => self.record_failure(column),
        }
        parsed
    }

    pub fn record_failure(&mut self, column: &str) {
        *self.failures.entry(column.to_string()).or_default() += 1;
    }

    pub fn total_failures(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ajoute les compteurs d'un autre rapport
    pub fn merge(&mut self, other: &CoercionReport) {
        self.converted += other.converted;
        for (column, count) in &other.failures {
            *self.failures.entry(column.clone()).or_default() += count;
        }
    }

    /// Une ligne par colonne en échec
    pub fn lines(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|(column, count)| format!("{}: {} invalid values", column, count))
            .collect()
    }
}
