//! Types d'erreurs pour le crate ndvi-geo

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture ou de l'algèbre géométrique
#[derive(Debug, Error)]
pub enum GeoError {
    /// Erreur d'I/O lors de la lecture du shapefile
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shapefile ou DBF illisible
    #[error("Shapefile error in {path}: {reason}")]
    Shapefile { path: String, reason: String },

    /// Projection non reconnue dans le .prj
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    /// Échec de transformation de coordonnées
    #[error("Reprojection EPSG:{from} -> EPSG:{to} failed: {reason}")]
    Reprojection { from: u32, to: u32, reason: String },

    /// Échec d'une opération d'overlay (union, intersection, ...)
    #[error("Overlay {operation} failed: {reason}")]
    Overlay { operation: &'static str, reason: String },

    /// Champ absent du schéma
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Le dissolve groupé n'a produit aucune géométrie
    #[error("Dissolved geometry is empty (grouped by {group_fields})")]
    EmptyDissolveResult { group_fields: String },
}

impl GeoError {
    /// Crée une erreur de lecture de shapefile avec contexte
    pub fn shapefile(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Shapefile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Crée une erreur d'overlay
    pub fn overlay(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Overlay {
            operation,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de reprojection
    pub fn reprojection(from: u32, to: u32, reason: impl Into<String>) -> Self {
        Self::Reprojection {
            from,
            to,
            reason: reason.into(),
        }
    }
}
