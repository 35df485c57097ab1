//! The currency exchange ledger.
//!
//! An exchange is recorded as two rows written in one SQL transaction: a
//! withdrawal in the currency handed out and a deposit in the currency taken
//! in. Either both rows land or neither does.

use axum::{Json, extract::State, http::StatusCode};
use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    branch::BranchId,
    currency::Currency,
    db::{CreateTable, MapRow},
    user::UserId,
};

use super::{TransactionStatus, TransactionType};

/// One leg of a currency exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeTransaction {
    /// The ID of the row.
    pub id: i64,
    /// The branch the exchange happened at.
    pub branch_id: BranchId,
    /// The teller who performed the exchange.
    pub user_id: UserId,
    /// The currency of this leg.
    pub currency: Currency,
    /// The amount of this leg.
    pub amount: f64,
    /// Deposit for the currency taken in, withdrawal for the one handed out.
    pub txn_type: TransactionType,
    /// The HTG/USD rate the exchange was made at.
    pub rate: f64,
    /// The lifecycle state of the row.
    pub status: TransactionStatus,
    /// When the exchange was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to perform a currency exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExchange {
    /// The branch the exchange happens at.
    pub branch_id: BranchId,
    /// The teller performing the exchange.
    pub user_id: UserId,
    /// The currency the customer brings in.
    pub from_currency: Currency,
    /// The currency the customer receives.
    pub to_currency: Currency,
    /// The amount brought in, in `from_currency`. Must be positive.
    pub amount: f64,
    /// The conversion rate applied to `amount`. Must be positive.
    pub rate: f64,
}

/// The two ledger rows an exchange produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeResult {
    /// The deposit leg, in the currency the branch took in.
    pub taken_in: ExchangeTransaction,
    /// The withdrawal leg, in the currency the branch handed out.
    pub handed_out: ExchangeTransaction,
}

impl CreateTable for ExchangeTransaction {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE exchange_transaction (
                id INTEGER PRIMARY KEY,
                branch_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                currency TEXT NOT NULL,
                amount REAL NOT NULL,
                txn_type TEXT NOT NULL,
                rate REAL NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(branch_id) REFERENCES branch(id),
                FOREIGN KEY(user_id) REFERENCES user(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for ExchangeTransaction {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            branch_id: row.get(offset + 1)?,
            user_id: row.get(offset + 2)?,
            currency: row.get(offset + 3)?,
            amount: row.get(offset + 4)?,
            txn_type: row.get(offset + 5)?,
            rate: row.get(offset + 6)?,
            status: row.get(offset + 7)?,
            created_at: row.get(offset + 8)?,
        })
    }
}

fn insert_leg(
    connection: &Connection,
    exchange: &NewExchange,
    currency: Currency,
    amount: f64,
    txn_type: TransactionType,
    created_at: OffsetDateTime,
) -> Result<ExchangeTransaction, Error> {
    connection.execute(
        "INSERT INTO exchange_transaction
            (branch_id, user_id, currency, amount, txn_type, rate, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            exchange.branch_id,
            exchange.user_id,
            currency,
            amount,
            txn_type,
            exchange.rate,
            TransactionStatus::Completed,
            created_at,
        ),
    )?;

    Ok(ExchangeTransaction {
        id: connection.last_insert_rowid(),
        branch_id: exchange.branch_id,
        user_id: exchange.user_id,
        currency,
        amount,
        txn_type,
        rate: exchange.rate,
        status: TransactionStatus::Completed,
        created_at,
    })
}

/// Record a currency exchange as two completed ledger rows, atomically.
///
/// The branch takes in `amount` of `from_currency` and hands out
/// `amount * rate` of `to_currency`.
///
/// # Errors
/// Returns [Error::SameCurrencyExchange] if both currencies are the same,
/// [Error::NonPositiveAmount]/[Error::NonPositiveRate] for bad numbers, and
/// [Error::InvalidForeignKey] if the branch or user does not exist. No rows
/// are written on failure.
pub fn record_exchange(
    connection: &Connection,
    exchange: &NewExchange,
) -> Result<ExchangeResult, Error> {
    if exchange.from_currency == exchange.to_currency {
        return Err(Error::SameCurrencyExchange);
    }
    if exchange.amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }
    if exchange.rate <= 0.0 {
        return Err(Error::NonPositiveRate);
    }

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;
    let created_at = OffsetDateTime::now_utc();

    let taken_in = insert_leg(
        &transaction,
        exchange,
        exchange.from_currency,
        exchange.amount,
        TransactionType::Deposit,
        created_at,
    )?;
    let handed_out = insert_leg(
        &transaction,
        exchange,
        exchange.to_currency,
        exchange.amount * exchange.rate,
        TransactionType::Withdrawal,
        created_at,
    )?;

    transaction.commit()?;

    Ok(ExchangeResult {
        taken_in,
        handed_out,
    })
}

/// A route handler for performing a currency exchange.
pub async fn create_exchange_endpoint(
    State(state): State<AppState>,
    Json(new_exchange): Json<NewExchange>,
) -> Result<(StatusCode, Json<ExchangeResult>), Error> {
    let connection = state.connection()?;
    let result = record_exchange(&connection, &new_exchange)?;

    Ok((StatusCode::CREATED, Json(result)))
}
