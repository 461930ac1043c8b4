use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::LedgerError;

/// Balance owner identifier.
pub type UserId = i64;

/// Outcome of a ledger event from the player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Win,
    Lose,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Win => "win",
            TransactionState::Lose => "lose",
        }
    }
}

impl FromStr for TransactionState {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(TransactionState::Win),
            "lose" => Ok(TransactionState::Lose),
            other => Err(LedgerError::InvalidArgument(format!(
                "invalid transaction state: {other}"
            ))),
        }
    }
}

/// Provenance of a transaction. Recorded as-is; it plays no part in the
/// balance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Game,
    Server,
    Payment,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Game => "game",
            SourceType::Server => "server",
            SourceType::Payment => "payment",
        }
    }
}

impl FromStr for SourceType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "game" => Ok(SourceType::Game),
            "server" => Ok(SourceType::Server),
            "payment" => Ok(SourceType::Payment),
            other => Err(LedgerError::InvalidArgument(format!(
                "invalid source type: {other}"
            ))),
        }
    }
}

/// A validated transaction submitted for processing. The id is the
/// caller-supplied idempotency key.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub state: TransactionState,
    pub amount: Decimal,
    pub source_type: SourceType,
}

/// A durably stored ledger event. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    #[serde(rename = "transactionId")]
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub state: TransactionState,
    pub amount: Decimal,
    #[serde(rename = "sourceType")]
    pub source_type: SourceType,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Inbound transaction payload, as received on the wire. Amounts and ids
/// arrive as strings and are parsed into their domain types by
/// [`TransactionBody::into_new_transaction`].
#[derive(Debug, Deserialize, Validate)]
pub struct TransactionBody {
    pub state: String,
    #[validate(custom = "validate_amount")]
    pub amount: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
}

fn validate_amount(amount: &str) -> Result<(), ValidationError> {
    match Decimal::from_str(amount) {
        Ok(value) if value > Decimal::ZERO => Ok(()),
        _ => Err(ValidationError::new("amount must be a positive number")),
    }
}

impl TransactionBody {
    /// Validate the raw payload and lift it into the engine's input type.
    pub fn into_new_transaction(
        self,
        user_id: UserId,
        source_type: SourceType,
    ) -> Result<NewTransaction, LedgerError> {
        self.validate()
            .map_err(|_| LedgerError::InvalidArgument("amount must be a positive number".into()))?;

        // validate() already proved the amount parses.
        let amount = Decimal::from_str(&self.amount)
            .map_err(|err| LedgerError::InvalidArgument(format!("invalid amount: {err}")))?;

        let state: TransactionState = self.state.parse()?;

        let id = Uuid::parse_str(&self.transaction_id)
            .map_err(|_| LedgerError::InvalidArgument("invalid transactionId format".into()))?;
        if id.is_nil() {
            return Err(LedgerError::InvalidArgument(
                "transaction id cannot be nil".into(),
            ));
        }

        Ok(NewTransaction {
            id,
            user_id,
            state,
            amount,
            source_type,
        })
    }
}

/// Balance response, formatted as a fixed two-decimal string.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub balance: String,
}

impl BalanceResponse {
    pub fn new(user_id: UserId, balance: Decimal) -> Self {
        BalanceResponse {
            user_id,
            balance: format!("{balance:.2}"),
        }
    }
}
