//! Entrepôt en mémoire, pour les tests et les exécutions à blanc

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{ClientRecord, LoadOutcome, RawStore, UnitScope, UnitTransaction, Warehouse};
use crate::aggregate::WarehouseRow;
use crate::error::WarehouseError;
use crate::raw::{RawTable, RawValue};

#[derive(Debug, Default)]
struct State {
    clients: Vec<ClientRecord>,
    rows: Vec<WarehouseRow>,
    raw: BTreeMap<UnitScope, Vec<Vec<RawValue>>>,
    executed: Vec<String>,
    commits: usize,
    rollbacks: usize,
    failing_commits: usize,
}

fn in_scope(row: &WarehouseRow, scope: &UnitScope) -> bool {
    row.client_id == scope.client_id && row.safra == scope.safra && row.janela == scope.janela
}

/// Entrepôt partagé ; les clones voient le même état
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<State>>,
}

impl MemoryWarehouse {
    pub fn with_clients(clients: Vec<ClientRecord>) -> Self {
        let warehouse = Self::default();
        warehouse.lock().clients = clients;
        warehouse
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lignes validées, dans l'ordre d'insertion
    pub fn rows(&self) -> Vec<WarehouseRow> {
        self.lock().rows.clone()
    }

    pub fn rows_for(&self, scope: &UnitScope) -> Vec<WarehouseRow> {
        self.lock()
            .rows
            .iter()
            .filter(|r| in_scope(r, scope))
            .cloned()
            .collect()
    }

    pub fn raw_rows(&self, scope: &UnitScope) -> Vec<Vec<RawValue>> {
        self.lock().raw.get(scope).cloned().unwrap_or_default()
    }

    /// Instructions passées à `execute`
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    /// Les `n` prochains commits échouent avec une perte de connexion
    pub fn fail_next_commits(&self, n: usize) {
        self.lock().failing_commits = n;
    }
}

enum Op {
    Delete(UnitScope),
    Insert(Vec<WarehouseRow>),
}

/// Transaction en mémoire : les opérations ne s'appliquent qu'au commit
struct MemoryTransaction {
    warehouse: MemoryWarehouse,
    ops: Vec<Op>,
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn clients(&self) -> Result<Vec<ClientRecord>, WarehouseError> {
        let mut clients = self.lock().clients.clone();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn execute(&self, sql: &str) -> Result<u64, WarehouseError> {
        self.lock().executed.push(sql.to_string());
        Ok(0)
    }

    async fn begin(&self) -> Result<Box<dyn UnitTransaction>, WarehouseError> {
        Ok(Box::new(MemoryTransaction {
            warehouse: self.clone(),
            ops: Vec::new(),
        }))
    }
}

#[async_trait]
impl UnitTransaction for MemoryTransaction {
    async fn delete(&mut self, scope: &UnitScope) -> Result<u64, WarehouseError> {
        let count = self
            .warehouse
            .lock()
            .rows
            .iter()
            .filter(|r| in_scope(r, scope))
            .count();
        self.ops.push(Op::Delete(scope.clone()));
        Ok(count as u64)
    }

    async fn bulk_insert(&mut self, rows: &[WarehouseRow]) -> Result<u64, WarehouseError> {
        self.ops.push(Op::Insert(rows.to_vec()));
        Ok(rows.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), WarehouseError> {
        let MemoryTransaction { warehouse, ops } = *self;
        let mut state = warehouse.lock();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            state.rollbacks += 1;
            return Err(WarehouseError::ConnectionLost(
                "connection closed during commit".into(),
            ));
        }

        for op in ops {
            match op {
                Op::Delete(scope) => state.rows.retain(|r| !in_scope(r, &scope)),
                Op::Insert(rows) => state.rows.extend(rows),
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), WarehouseError> {
        self.warehouse.lock().rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl RawStore for MemoryWarehouse {
    async fn count_raw(&self, scope: &UnitScope) -> Result<u64, WarehouseError> {
        Ok(self.lock().raw.get(scope).map_or(0, |rows| rows.len() as u64))
    }

    async fn store_raw(
        &self,
        scope: &UnitScope,
        table: &RawTable,
        replace: bool,
    ) -> Result<LoadOutcome, WarehouseError> {
        let mut state = self.lock();
        let rows = state.raw.entry(scope.clone()).or_default();
        let deleted = if replace {
            let n = rows.len() as u64;
            rows.clear();
            n
        } else {
            0
        };
        rows.extend(table.rows.iter().cloned());
        state.commits += 1;
        Ok(LoadOutcome {
            deleted,
            inserted: table.rows.len() as u64,
        })
    }
}
