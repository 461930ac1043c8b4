//! Storage contract for the balance ledger.
//!
//! The engine talks to two traits. [`LedgerStore`] is the shared, read-side
//! handle that can also open an atomic unit; [`ScopedLedger`] is the handle a
//! unit runs against, and the only place the write operations exist. Durable
//! implementations map a unit to one database transaction: every operation
//! performed through the scoped handle commits or rolls back together.

pub mod memory;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{NewTransaction, TransactionRecord, UserId};

/// Work executed against a scoped handle inside one atomic unit.
pub type AtomicUnit =
    Box<dyn for<'s> FnOnce(&'s mut dyn ScopedLedger) -> BoxFuture<'s, Result<()>> + Send>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance for the user. `UserNotFound` if the user does not exist.
    async fn balance(&self, user_id: UserId) -> Result<Decimal>;

    /// Existence lookup by transaction id.
    async fn find_transaction(&self, id: Uuid) -> Result<Option<TransactionRecord>>;

    /// Run `unit` inside a single all-or-nothing boundary. If the unit
    /// returns an error, every operation it performed is undone.
    async fn run_atomic(&self, unit: AtomicUnit) -> Result<()>;
}

#[async_trait]
pub trait ScopedLedger: Send {
    /// Persist a new transaction record. `DuplicateTransaction` if the id is
    /// already recorded; the storage layer enforces this with a uniqueness
    /// constraint, not just a lookup.
    async fn insert_transaction(&mut self, transaction: &NewTransaction) -> Result<()>;

    /// Add `delta` to the user's stored balance in place. Callers decide the
    /// sign; no validation happens here.
    async fn apply_delta(&mut self, user_id: UserId, delta: Decimal) -> Result<()>;

    /// Already inside a unit: execute `unit` against this handle rather than
    /// opening a nested one. Commit and rollback stay with the outermost scope.
    async fn run_atomic(&mut self, unit: AtomicUnit) -> Result<()>;
}
