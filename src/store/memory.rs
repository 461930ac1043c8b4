//! In-memory ledger store.
//!
//! Backs the engine in tests and local development. Uniqueness of the
//! transaction id is enforced at the commit point, mirroring a database
//! constraint firing at the durability boundary rather than at lookup time.
//! Fault-injection hooks let tests exercise the rollback and conflict paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::{LedgerError, Result};
use crate::models::{NewTransaction, TransactionRecord, UserId};
use crate::store::{AtomicUnit, LedgerStore, ScopedLedger};

#[derive(Default)]
struct MemoryState {
    balances: HashMap<UserId, Decimal>,
    transactions: HashMap<Uuid, TransactionRecord>,
}

#[derive(Default)]
struct FaultInjection {
    fail_next_apply_delta: AtomicBool,
    insert_latency_ms: AtomicU64,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultInjection>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user with a starting balance.
    pub fn seed_user(&self, user_id: UserId, balance: Decimal) {
        self.state.lock().balances.insert(user_id, balance);
    }

    /// Number of durably committed transaction records.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Make the next `apply_delta` fail with a storage error.
    pub fn fail_next_apply_delta(&self) {
        self.faults.fail_next_apply_delta.store(true, Ordering::SeqCst);
    }

    /// Delay each `insert_transaction` by `latency`, widening the window
    /// between the engine's existence check and the commit.
    pub fn set_insert_latency(&self, latency: Duration) {
        self.faults
            .insert_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn balance(&self, user_id: UserId) -> Result<Decimal> {
        self.state
            .lock()
            .balances
            .get(&user_id)
            .copied()
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<TransactionRecord>> {
        Ok(self.state.lock().transactions.get(&id).cloned())
    }

    async fn run_atomic(&self, unit: AtomicUnit) -> Result<()> {
        let mut scoped = MemoryScopedLedger {
            state: Arc::clone(&self.state),
            faults: Arc::clone(&self.faults),
            staged: Vec::new(),
        };

        unit(&mut scoped).await?;

        let staged = scoped.staged;
        let mut state = self.state.lock();

        // The constraint fires at the durability boundary: a record committed
        // by a concurrent unit after our staging check still aborts us here.
        for op in &staged {
            if let StagedOp::Insert(record) = op {
                if state.transactions.contains_key(&record.id) {
                    return Err(LedgerError::DuplicateTransaction(record.id));
                }
            }
        }

        for op in staged {
            match op {
                StagedOp::Insert(record) => {
                    state.transactions.insert(record.id, record);
                }
                StagedOp::Delta { user_id, delta } => {
                    *state.balances.entry(user_id).or_insert(Decimal::ZERO) += delta;
                }
            }
        }

        Ok(())
    }
}

enum StagedOp {
    Insert(TransactionRecord),
    Delta { user_id: UserId, delta: Decimal },
}

/// Scoped handle over the in-memory store. Operations are staged and only
/// become visible when the unit commits.
pub struct MemoryScopedLedger {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultInjection>,
    staged: Vec<StagedOp>,
}

#[async_trait]
impl ScopedLedger for MemoryScopedLedger {
    async fn insert_transaction(&mut self, transaction: &NewTransaction) -> Result<()> {
        let latency = self.faults.insert_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let already_staged = self
            .staged
            .iter()
            .any(|op| matches!(op, StagedOp::Insert(r) if r.id == transaction.id));
        if already_staged || self.state.lock().transactions.contains_key(&transaction.id) {
            return Err(LedgerError::DuplicateTransaction(transaction.id));
        }

        self.staged.push(StagedOp::Insert(TransactionRecord {
            id: transaction.id,
            user_id: transaction.user_id,
            state: transaction.state,
            amount: transaction.amount,
            source_type: transaction.source_type,
            created_at: Utc::now(),
        }));

        Ok(())
    }

    async fn apply_delta(&mut self, user_id: UserId, delta: Decimal) -> Result<()> {
        if self
            .faults
            .fail_next_apply_delta
            .swap(false, Ordering::SeqCst)
        {
            return Err(LedgerError::storage("apply_delta", "injected failure"));
        }

        if !self.state.lock().balances.contains_key(&user_id) {
            return Err(LedgerError::UserNotFound(user_id));
        }

        self.staged.push(StagedOp::Delta { user_id, delta });
        Ok(())
    }

    async fn run_atomic(&mut self, unit: AtomicUnit) -> Result<()> {
        unit(self).await
    }
}
