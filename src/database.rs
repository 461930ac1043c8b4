//! Postgres-backed ledger store.
//!
//! Atomic units map to database transactions. The `transactions.id` primary
//! key is the uniqueness constraint the idempotency guarantee rests on:
//! a duplicate insert surfaces as `DuplicateTransaction` regardless of what
//! any earlier lookup observed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};
use crate::models::{NewTransaction, TransactionRecord, UserId};
use crate::store::{AtomicUnit, LedgerStore, ScopedLedger};

pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|err| LedgerError::storage("connect", err))?;

        Ok(PostgresLedger { pool })
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| LedgerError::storage("migrate", err))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn balance(&self, user_id: UserId) -> Result<Decimal> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| LedgerError::storage("balance", err))?;

        balance.ok_or(LedgerError::UserNotFound(user_id))
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, user_id, state, amount, source_type, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| LedgerError::storage("find_transaction", err))?;

        row.map(TransactionRecord::try_from).transpose()
    }

    async fn run_atomic(&self, unit: AtomicUnit) -> Result<()> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LedgerError::storage("begin", err))?;

        let mut scoped = PostgresScopedLedger { tx };

        match unit(&mut scoped).await {
            Ok(()) => scoped
                .tx
                .commit()
                .await
                .map_err(|err| LedgerError::storage("commit", err)),
            Err(err) => {
                // Rollback failures are secondary; the unit's error is the one
                // worth reporting.
                let _ = scoped.tx.rollback().await;
                Err(err)
            }
        }
    }
}

/// Scoped handle bound to one open database transaction.
pub struct PostgresScopedLedger {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ScopedLedger for PostgresScopedLedger {
    async fn insert_transaction(&mut self, transaction: &NewTransaction) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, state, amount, source_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.user_id)
        .bind(transaction.state.as_str())
        .bind(transaction.amount)
        .bind(transaction.source_type.as_str())
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(LedgerError::DuplicateTransaction(transaction.id))
            }
            Err(err) if is_foreign_key_violation(&err) => {
                Err(LedgerError::UserNotFound(transaction.user_id))
            }
            Err(err) => Err(LedgerError::storage("insert_transaction", err)),
        }
    }

    async fn apply_delta(&mut self, user_id: UserId, delta: Decimal) -> Result<()> {
        let result = sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = $2")
            .bind(delta)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|err| LedgerError::storage("apply_delta", err))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::UserNotFound(user_id));
        }

        Ok(())
    }

    async fn run_atomic(&mut self, unit: AtomicUnit) -> Result<()> {
        // Already inside a transaction; reuse it.
        unit(self).await
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}

#[derive(FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: i64,
    state: String,
    amount: Decimal,
    source_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(TransactionRecord {
            id: row.id,
            user_id: row.user_id,
            state: row.state.parse()?,
            amount: row.amount,
            source_type: row.source_type.parse()?,
            created_at: row.created_at,
        })
    }
}
