//! Transaction-processing engine.
//!
//! The only place balance-affecting rules live. The engine keeps no state of
//! its own and takes no locks; correctness under concurrent submissions is
//! delegated to the store's atomic unit and its uniqueness constraint on the
//! transaction id.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::errors::{LedgerError, Result};
use crate::models::{NewTransaction, TransactionState, UserId};
use crate::store::LedgerStore;

/// How a submission was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The transaction was recorded and the balance moved.
    Applied,
    /// The id was seen before; nothing changed. Reported as success to the
    /// caller, who should not retry.
    AlreadyProcessed,
}

pub struct TransactionService {
    store: Arc<dyn LedgerStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        TransactionService { store }
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Decimal> {
        self.store.balance(user_id).await
    }

    /// Apply a transaction at most once.
    ///
    /// The record and the balance delta are written inside one atomic unit,
    /// insert first: a duplicate id aborts the unit before any balance
    /// mutation is attempted. A conflict raised by the constraint is the
    /// authoritative idempotency signal and is absorbed into
    /// [`ProcessOutcome::AlreadyProcessed`]; the upfront lookup only spares
    /// the store a doomed write for the common replay case.
    pub async fn process_transaction(&self, transaction: NewTransaction) -> Result<ProcessOutcome> {
        if transaction.id.is_nil() {
            return Err(LedgerError::InvalidArgument(
                "transaction id cannot be nil".into(),
            ));
        }

        // The boundary validator already rejects these; re-check before
        // touching the ledger.
        if transaction.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(format!(
                "amount must be positive, got {}",
                transaction.amount
            )));
        }

        if self.store.find_transaction(transaction.id).await?.is_some() {
            debug!(transaction_id = %transaction.id, "transaction already recorded, skipping");
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        let delta = match transaction.state {
            TransactionState::Win => transaction.amount,
            TransactionState::Lose => -transaction.amount,
        };

        let id = transaction.id;
        let user_id = transaction.user_id;
        let state = transaction.state;
        let amount = transaction.amount;

        let result = self
            .store
            .run_atomic(Box::new(move |scoped| {
                Box::pin(async move {
                    scoped.insert_transaction(&transaction).await?;
                    scoped.apply_delta(user_id, delta).await
                })
            }))
            .await;

        match result {
            Ok(()) => {
                info!(
                    transaction_id = %id,
                    user_id,
                    state = state.as_str(),
                    amount = %amount,
                    "transaction applied"
                );
                Ok(ProcessOutcome::Applied)
            }
            Err(LedgerError::DuplicateTransaction(_)) => {
                // A concurrent submission with the same id committed between
                // our lookup and our insert.
                debug!(transaction_id = %id, "duplicate committed concurrently, skipping");
                Ok(ProcessOutcome::AlreadyProcessed)
            }
            Err(err) => {
                error!(transaction_id = %id, user_id, error = %err, "transaction failed");
                Err(err)
            }
        }
    }
}
