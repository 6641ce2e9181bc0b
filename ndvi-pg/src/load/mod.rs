//! Chargement idempotent dans l'entrepôt
//!
//! Une unité (client, safra, janela) est remplacée en bloc : suppression
//! des lignes existantes puis insertion des nouvelles, dans une seule
//! transaction. Rejouer une unité laisse donc l'entrepôt dans le même état.

pub(crate) mod csv;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod retry;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::aggregate::WarehouseRow;
use crate::error::WarehouseError;
use crate::raw::RawTable;

pub use memory::MemoryWarehouse;
pub use pool::{create_pool, test_connection, DatabaseConfig, SslMode};
pub use postgres::PgWarehouse;
pub use retry::{with_retry, RetryPolicy};

/// Unité de chargement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitScope {
    pub client_id: i64,
    pub safra: i32,
    pub janela: String,
}

impl UnitScope {
    pub fn new(client_id: i64, safra: i32, janela: impl Into<String>) -> Self {
        Self {
            client_id,
            safra,
            janela: janela.into(),
        }
    }
}

impl fmt::Display for UnitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {} / {} / {}", self.client_id, self.safra, self.janela)
    }
}

/// Client de la table des clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: i64,
    pub name: String,
}

/// Lignes supprimées puis insérées pour une unité
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub deleted: u64,
    pub inserted: u64,
}

/// Entrepôt cible
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Clients connus, triés par id
    async fn clients(&self) -> Result<Vec<ClientRecord>, WarehouseError>;

    /// Exécute une instruction SQL hors transaction
    async fn execute(&self, sql: &str) -> Result<u64, WarehouseError>;

    /// Ouvre une transaction d'unité
    async fn begin(&self) -> Result<Box<dyn UnitTransaction>, WarehouseError>;
}

/// Transaction couvrant le remplacement d'une unité
///
/// Une transaction abandonnée sans `commit` n'a aucun effet.
#[async_trait]
pub trait UnitTransaction: Send {
    async fn delete(&mut self, scope: &UnitScope) -> Result<u64, WarehouseError>;

    async fn bulk_insert(&mut self, rows: &[WarehouseRow]) -> Result<u64, WarehouseError>;

    async fn commit(self: Box<Self>) -> Result<(), WarehouseError>;

    async fn rollback(self: Box<Self>) -> Result<(), WarehouseError>;
}

/// Stockage des lignes brutes du shapefile
#[async_trait]
pub trait RawStore: Send + Sync {
    async fn count_raw(&self, scope: &UnitScope) -> Result<u64, WarehouseError>;

    /// Insère `table` ; avec `replace`, supprime d'abord les lignes de l'unité
    /// (même transaction)
    async fn store_raw(
        &self,
        scope: &UnitScope,
        table: &RawTable,
        replace: bool,
    ) -> Result<LoadOutcome, WarehouseError>;
}

/// Remplace les lignes d'une unité, avec rejeu sur erreur transitoire
///
/// Le nom et l'id du client sont reportés sur chaque ligne. Un jeu de
/// lignes vide ne touche pas à l'entrepôt.
pub async fn load_unit(
    warehouse: &dyn Warehouse,
    scope: &UnitScope,
    client: &ClientRecord,
    rows: &[WarehouseRow],
    retry: &RetryPolicy,
) -> Result<LoadOutcome, WarehouseError> {
    if rows.is_empty() {
        debug!(unit = %scope, "No rows to load");
        return Ok(LoadOutcome::default());
    }

    let stamped: Vec<WarehouseRow> = rows
        .iter()
        .cloned()
        .map(|mut row| {
            row.client_id = client.id;
            row.client_name = client.name.clone();
            row
        })
        .collect();

    let outcome = with_retry(retry, "load unit", || {
        replace_unit(warehouse, scope, &stamped)
    })
    .await?;

    info!(
        unit = %scope,
        client = %client.name,
        deleted = outcome.deleted,
        inserted = outcome.inserted,
        "Unit loaded"
    );
    Ok(outcome)
}

async fn replace_unit(
    warehouse: &dyn Warehouse,
    scope: &UnitScope,
    rows: &[WarehouseRow],
) -> Result<LoadOutcome, WarehouseError> {
    let mut tx = warehouse.begin().await?;

    let deleted = match tx.delete(scope).await {
        Ok(n) => n,
        Err(e) => return abort(tx, scope, e).await,
    };
    let inserted = match tx.bulk_insert(rows).await {
        Ok(n) => n,
        Err(e) => return abort(tx, scope, e).await,
    };

    tx.commit().await?;
    Ok(LoadOutcome { deleted, inserted })
}

async fn abort(
    tx: Box<dyn UnitTransaction>,
    scope: &UnitScope,
    cause: WarehouseError,
) -> Result<LoadOutcome, WarehouseError> {
    error!(unit = %scope, error = %cause, "Rolling back unit");
    if let Err(e) = tx.rollback().await {
        error!(unit = %scope, error = %e, "Explicit rollback failed");
    }
    Err(cause)
}
