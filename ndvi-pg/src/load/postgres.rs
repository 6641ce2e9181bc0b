//! Entrepôt PostgreSQL
//!
//! Chaque transaction d'unité tient sa propre connexion du pool. Une
//! transaction abandonnée sans commit ni rollback retire sa connexion du
//! pool : la fermer suffit à annuler la transaction côté serveur.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use deadpool_postgres::{Object, Pool};
use futures::SinkExt;
use tracing::{debug, warn};

use super::csv::CsvRow;
use super::{ClientRecord, LoadOutcome, RawStore, UnitScope, UnitTransaction, Warehouse};
use crate::aggregate::WarehouseRow;
use crate::config::Tables;
use crate::error::WarehouseError;
use crate::raw::{RawTable, RawValue, RAW_COLUMNS};

const WAREHOUSE_COLUMNS: &str =
    "client_id, client_name, chave, safra, janela, estagio, jan_col, gridcode, tp_prop, data_img, area_ndvi";

/// Entrepôt sur un pool deadpool
pub struct PgWarehouse {
    pool: Pool,
    tables: Tables,
}

impl PgWarehouse {
    pub fn new(pool: Pool, tables: Tables) -> Self {
        Self { pool, tables }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }
}

/// Instructions de création de la table d'entrepôt
pub fn warehouse_ddl(table: &str) -> Vec<String> {
    let mut statements = Vec::new();
    if let Some((schema, _)) = table.split_once('.') {
        statements.push(format!("CREATE SCHEMA IF NOT EXISTS {}", schema));
    }
    statements.push(format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            client_id BIGINT NOT NULL,
            client_name TEXT NOT NULL,
            chave TEXT NOT NULL,
            safra INTEGER NOT NULL,
            janela TEXT NOT NULL,
            estagio TEXT NOT NULL,
            jan_col TEXT NOT NULL,
            gridcode BIGINT NOT NULL,
            tp_prop TEXT NOT NULL,
            data_img DATE,
            area_ndvi DOUBLE PRECISION NOT NULL
        )
        "#,
        table
    ));
    let index = table.replace('.', "_");
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS {}_unit_idx ON {} (client_id, safra, janela)",
        index, table
    ));
    statements
}

fn encode_area(area: f64) -> Result<f64, WarehouseError> {
    if area.is_finite() {
        Ok(area)
    } else {
        Err(WarehouseError::Encode {
            what: "area_ndvi",
            reason: format!("non-finite value {}", area),
        })
    }
}

fn warehouse_csv(rows: &[WarehouseRow]) -> Result<Bytes, WarehouseError> {
    let mut buf = BytesMut::with_capacity(rows.len() * 96);
    for row in rows {
        let mut csv = CsvRow::new(&mut buf);
        csv.plain(row.client_id)
            .text(&row.client_name)
            .text(row.chave.as_str())
            .plain(row.safra)
            .text(&row.janela)
            .text(row.estagio.as_str())
            .text(row.jan_col.as_str())
            .plain(row.gridcode)
            .text(row.tp_prop.as_str());
        match row.data_img {
            Some(date) => csv.plain(date.format("%Y-%m-%d")),
            None => csv.null(),
        };
        csv.plain(encode_area(row.area_ndvi)?).end();
    }
    Ok(buf.freeze())
}

fn raw_csv(table: &RawTable) -> Bytes {
    let mut buf = BytesMut::with_capacity(table.len() * 512);
    for row in &table.rows {
        let mut csv = CsvRow::new(&mut buf);
        for value in row {
            match value {
                RawValue::Null => csv.null(),
                RawValue::Text(s) | RawValue::Geometry(s) => csv.text(s),
                RawValue::Number(n) if n.is_finite() => csv.plain(n),
                RawValue::Number(_) => csv.null(),
                RawValue::Integer(i) => csv.plain(i),
                RawValue::Date(d) => csv.plain(d.format("%Y-%m-%d")),
            };
        }
        csv.end();
    }
    buf.freeze()
}

/// Envoie `data` via `COPY ... FROM STDIN` et retourne le nombre de lignes copiées
async fn copy_csv(
    client: &tokio_postgres::Client,
    table: &str,
    columns: &str,
    data: Bytes,
) -> Result<u64, WarehouseError> {
    let sql = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '')",
        table, columns
    );
    let sink = client.copy_in::<_, Bytes>(sql.as_str()).await?;
    let mut sink = std::pin::pin!(sink);
    sink.as_mut().send(data).await?;
    let copied = sink.as_mut().finish().await?;
    Ok(copied)
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn clients(&self) -> Result<Vec<ClientRecord>, WarehouseError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT id::bigint, cliente::text FROM {} ORDER BY id",
            self.tables.clients
        );
        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter()
            .map(|row| -> Result<ClientRecord, WarehouseError> {
                Ok(ClientRecord {
                    id: row.try_get(0)?,
                    name: row.try_get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn execute(&self, sql: &str) -> Result<u64, WarehouseError> {
        let client = self.pool.get().await?;
        Ok(client.execute(sql, &[]).await?)
    }

    async fn begin(&self) -> Result<Box<dyn UnitTransaction>, WarehouseError> {
        let client = self.pool.get().await?;
        client.batch_execute("BEGIN").await?;
        Ok(Box::new(PgTransaction {
            client: Some(client),
            table: self.tables.warehouse.clone(),
        }))
    }
}

/// Transaction d'unité ; `client` est `None` une fois terminée
struct PgTransaction {
    client: Option<Object>,
    table: String,
}

impl PgTransaction {
    fn client(&self) -> Result<&Object, WarehouseError> {
        self.client
            .as_ref()
            .ok_or_else(|| WarehouseError::ConnectionLost("transaction already finished".into()))
    }

    /// Termine la transaction ; en cas d'échec la connexion n'est pas rendue au pool
    async fn finish(&mut self, statement: &str) -> Result<(), WarehouseError> {
        let client = self
            .client
            .take()
            .ok_or_else(|| WarehouseError::ConnectionLost("transaction already finished".into()))?;
        if let Err(e) = client.batch_execute(statement).await {
            drop(Object::take(client));
            return Err(e.into());
        }
        Ok(())
    }

    async fn replace_raw(
        &self,
        scope: &UnitScope,
        data: Bytes,
        replace: bool,
    ) -> Result<LoadOutcome, WarehouseError> {
        let deleted = if replace {
            let sql = format!(
                "DELETE FROM {} WHERE clientes_id = $1::bigint AND safra = $2::integer AND janela = $3::text",
                self.table
            );
            self.client()?
                .execute(sql.as_str(), &[&scope.client_id, &scope.safra, &scope.janela])
                .await?
        } else {
            0
        };

        let inserted = if data.is_empty() {
            0
        } else {
            copy_csv(self.client()?, &self.table, &RAW_COLUMNS.join(", "), data).await?
        };
        Ok(LoadOutcome { deleted, inserted })
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!(table = %self.table, "Unit transaction dropped while open, closing its connection");
            drop(Object::take(client));
        }
    }
}

#[async_trait]
impl UnitTransaction for PgTransaction {
    async fn delete(&mut self, scope: &UnitScope) -> Result<u64, WarehouseError> {
        let sql = format!(
            "DELETE FROM {} WHERE client_id = $1::bigint AND safra = $2::integer AND janela = $3::text",
            self.table
        );
        let deleted = self
            .client()?
            .execute(sql.as_str(), &[&scope.client_id, &scope.safra, &scope.janela])
            .await?;
        debug!(unit = %scope, deleted, "Existing unit rows deleted");
        Ok(deleted)
    }

    async fn bulk_insert(&mut self, rows: &[WarehouseRow]) -> Result<u64, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let data = warehouse_csv(rows)?;
        copy_csv(self.client()?, &self.table, WAREHOUSE_COLUMNS, data).await
    }

    async fn commit(self: Box<Self>) -> Result<(), WarehouseError> {
        let mut tx = self;
        tx.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<(), WarehouseError> {
        let mut tx = self;
        tx.finish("ROLLBACK").await
    }
}

#[async_trait]
impl RawStore for PgWarehouse {
    async fn count_raw(&self, scope: &UnitScope) -> Result<u64, WarehouseError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE clientes_id = $1::bigint AND safra = $2::integer AND janela = $3::text",
            self.tables.raw
        );
        let row = client
            .query_one(sql.as_str(), &[&scope.client_id, &scope.safra, &scope.janela])
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(count.max(0) as u64)
    }

    async fn store_raw(
        &self,
        scope: &UnitScope,
        table: &RawTable,
        replace: bool,
    ) -> Result<LoadOutcome, WarehouseError> {
        let data = raw_csv(table);
        let client = self.pool.get().await?;
        client.batch_execute("BEGIN").await?;
        let mut tx = PgTransaction {
            client: Some(client),
            table: self.tables.raw.clone(),
        };

        match tx.replace_raw(scope, data, replace).await {
            Ok(outcome) => {
                tx.finish("COMMIT").await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = tx.finish("ROLLBACK").await {
                    warn!(unit = %scope, error = %rollback, "Explicit rollback failed");
                }
                Err(e)
            }
        }
    }
}
