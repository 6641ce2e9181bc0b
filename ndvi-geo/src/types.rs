//! Types de données pour le crate ndvi-geo
//!
//! Une `FeatureCollection` est une table typée : un schéma ordonné, et pour
//! chaque feature une géométrie et des valeurs alignées sur ce schéma.

use std::fmt;

use chrono::NaiveDate;
use geo::Geometry;

/// EPSG de sortie par défaut de toutes les opérations géométriques
pub const WGS84_EPSG: u32 = 4326;

/// Valeur d'un attribut
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Vrai pour `Null`, un texte vide ou un nombre NaN
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lecture numérique tolérante (entier, flottant ou texte numérique)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if !n.is_nan() => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// Type déclaré d'un champ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Date,
}

/// Champ du schéma
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Schéma ordonné, uniforme sur une collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position d'un champ (nom exact)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Position d'un champ, sans tenir compte de la casse
    pub fn index_of_ignore_case(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Ajoute un champ et retourne sa position
    pub fn push(&mut self, field: Field) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }

    /// Applique une fonction de renommage à tous les champs
    pub fn rename_all(&mut self, mut rename: impl FnMut(&str) -> String) {
        for field in &mut self.fields {
            field.name = rename(&field.name);
        }
    }
}

/// Une feature : géométrie, valeurs alignées sur le schéma, et EPSG des coordonnées
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub values: Vec<Value>,
    pub epsg: u32,
}

impl Feature {
    pub fn new(geometry: Geometry, values: Vec<Value>, epsg: u32) -> Self {
        Self {
            geometry,
            values,
            epsg,
        }
    }

    pub fn value(&self, index: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(index).unwrap_or(&NULL)
    }
}

/// Système de coordonnées d'une collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    Epsg(u32),
    /// Les features n'ont pas toutes le même EPSG (UTM local sur deux hémisphères)
    Mixed,
}

/// Collection de features partageant un schéma
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub schema: Schema,
    pub features: Vec<Feature>,
    /// EPSG déclaré de la collection (utilisé pour les features ajoutées)
    pub epsg: u32,
}

impl FeatureCollection {
    pub fn new(schema: Schema, epsg: u32) -> Self {
        Self {
            schema,
            features: Vec::new(),
            epsg,
        }
    }

    /// Collection vide ayant le même schéma et le même EPSG
    pub fn empty_like(&self) -> Self {
        Self::new(self.schema.clone(), self.epsg)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Ajoute une feature dans l'EPSG de la collection.
    ///
    /// Les valeurs manquantes sont complétées par `Null`, les surnuméraires ignorées.
    pub fn push(&mut self, geometry: Geometry, mut values: Vec<Value>) {
        values.resize(self.schema.len(), Value::Null);
        self.features.push(Feature::new(geometry, values, self.epsg));
    }

    /// CRS effectif : uniforme ou mixte
    pub fn crs(&self) -> Crs {
        let mut epsgs = self.features.iter().map(|f| f.epsg);
        match epsgs.next() {
            None => Crs::Epsg(self.epsg),
            Some(first) if epsgs.all(|e| e == first) => Crs::Epsg(first),
            Some(_) => Crs::Mixed,
        }
    }

    /// Position d'un colonne (nom exact)
    pub fn column(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Ajoute une colonne (remplie de `Null`) ou retourne la position existante
    pub fn ensure_column(&mut self, name: &str, kind: FieldKind) -> usize {
        if let Some(index) = self.schema.index_of(name) {
            return index;
        }
        let index = self.schema.push(Field::new(name, kind));
        for feature in &mut self.features {
            feature.values.resize(index + 1, Value::Null);
        }
        index
    }

    /// Valeurs d'une colonne, dans l'ordre des features
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.features.iter().map(move |f| f.value(index))
    }
}
