//! Types d'erreurs de ndvi-pg

use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Erreurs fatales de la classification
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Missing required column {column} (looked for: {})", candidates.join(", "))]
    MissingRequiredColumn {
        column: String,
        candidates: Vec<String>,
    },

    #[error("Invalid {column} values: [{}]", values.join(", "))]
    InvalidClassificationValue { column: String, values: Vec<String> },
}

/// Erreurs de l'entrepôt (PostgreSQL ou mémoire)
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Unknown client id {0}")]
    UnknownClient(i64),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },
}

impl WarehouseError {
    /// Vrai si l'unité peut être rejouée telle quelle
    pub fn is_transient(&self) -> bool {
        match self {
            WarehouseError::Postgres(e) => is_transient_pg(e),
            WarehouseError::Pool(PoolError::Backend(e)) => is_transient_pg(e),
            WarehouseError::Pool(PoolError::Timeout(_)) => true,
            WarehouseError::ConnectionLost(_) => true,
            _ => false,
        }
    }
}

fn is_transient_pg(e: &tokio_postgres::Error) -> bool {
    if e.is_closed() {
        return true;
    }
    matches!(
        e.code(),
        Some(code) if *code == SqlState::T_R_SERIALIZATION_FAILURE
            || *code == SqlState::T_R_DEADLOCK_DETECTED
    )
}
