//! Microcredit loans and their repayment ledger.
//!
//! Recording a payment is the one explicitly atomic write path: the payment
//! row and the loan's outstanding balance move together or not at all.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
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

use super::TransactionStatus;

/// A microcredit loan granted to a borrower.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicrocreditLoan {
    /// The ID of the loan.
    pub id: i64,
    /// The human-facing loan number, e.g. "MC-2026-0042".
    pub loan_number: String,
    /// The branch that granted the loan.
    pub branch_id: BranchId,
    /// The borrower's full name.
    pub borrower_name: String,
    /// The currency the loan was granted in.
    pub currency: Currency,
    /// The amount originally granted.
    pub principal: f64,
    /// How much is still owed.
    pub outstanding_balance: f64,
    /// When the loan was registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to register a loan.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLoan {
    /// The human-facing loan number.
    pub loan_number: String,
    /// The branch granting the loan.
    pub branch_id: BranchId,
    /// The borrower's full name.
    pub borrower_name: String,
    /// The currency the loan is granted in.
    pub currency: Currency,
    /// The amount granted. Must be positive.
    pub principal: f64,
}

/// A repayment received against a loan; a cash inflow for the branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicrocreditPayment {
    /// The ID of the payment.
    pub id: i64,
    /// The loan the payment was made against.
    pub loan_id: i64,
    /// The branch that received the cash.
    pub branch_id: BranchId,
    /// The cashier who received the payment.
    pub cashier_id: UserId,
    /// The currency of the payment (always the loan's currency).
    pub currency: Currency,
    /// The amount repaid.
    pub amount: f64,
    /// The lifecycle state of the row.
    pub status: TransactionStatus,
    /// When the payment was received.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to record a loan payment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    /// The loan being repaid.
    pub loan_id: i64,
    /// The currency the cash was handed over in; must match the loan.
    pub currency: Currency,
    /// The amount repaid. Must be positive and no more than the loan's
    /// outstanding balance.
    pub amount: f64,
    /// The cashier who received the payment.
    pub cashier_id: UserId,
}

impl CreateTable for MicrocreditLoan {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE microcredit_loan (
                id INTEGER PRIMARY KEY,
                loan_number TEXT NOT NULL UNIQUE,
                branch_id INTEGER NOT NULL,
                borrower_name TEXT NOT NULL,
                currency TEXT NOT NULL,
                principal REAL NOT NULL,
                outstanding_balance REAL NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(branch_id) REFERENCES branch(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for MicrocreditLoan {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            loan_number: row.get(offset + 1)?,
            branch_id: row.get(offset + 2)?,
            borrower_name: row.get(offset + 3)?,
            currency: row.get(offset + 4)?,
            principal: row.get(offset + 5)?,
            outstanding_balance: row.get(offset + 6)?,
            created_at: row.get(offset + 7)?,
        })
    }
}

impl CreateTable for MicrocreditPayment {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE microcredit_payment (
                id INTEGER PRIMARY KEY,
                loan_id INTEGER NOT NULL,
                branch_id INTEGER NOT NULL,
                cashier_id INTEGER NOT NULL,
                currency TEXT NOT NULL,
                amount REAL NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(loan_id) REFERENCES microcredit_loan(id),
                FOREIGN KEY(branch_id) REFERENCES branch(id),
                FOREIGN KEY(cashier_id) REFERENCES user(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for MicrocreditPayment {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            loan_id: row.get(offset + 1)?,
            branch_id: row.get(offset + 2)?,
            cashier_id: row.get(offset + 3)?,
            currency: row.get(offset + 4)?,
            amount: row.get(offset + 5)?,
            status: row.get(offset + 6)?,
            created_at: row.get(offset + 7)?,
        })
    }
}

/// Register a new loan.
///
/// Registering a loan does not move branch cash; the disbursement itself is
/// recorded by the teller as an ordinary withdrawal transaction.
///
/// # Errors
/// Returns [Error::NonPositiveAmount] for a non-positive principal and
/// [Error::InvalidForeignKey] if the branch does not exist.
pub fn create_loan(connection: &Connection, new_loan: &NewLoan) -> Result<MicrocreditLoan, Error> {
    if new_loan.principal <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }

    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO microcredit_loan
            (loan_number, branch_id, borrower_name, currency, principal, outstanding_balance, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
        (
            &new_loan.loan_number,
            new_loan.branch_id,
            &new_loan.borrower_name,
            new_loan.currency,
            new_loan.principal,
            created_at,
        ),
    )?;

    Ok(MicrocreditLoan {
        id: connection.last_insert_rowid(),
        loan_number: new_loan.loan_number.clone(),
        branch_id: new_loan.branch_id,
        borrower_name: new_loan.borrower_name.clone(),
        currency: new_loan.currency,
        principal: new_loan.principal,
        outstanding_balance: new_loan.principal,
        created_at,
    })
}

/// Retrieve a loan by its `id`.
///
/// # Errors
/// Returns [Error::LoanNotFound] if `id` does not refer to a loan.
pub fn get_loan(connection: &Connection, id: i64) -> Result<MicrocreditLoan, Error> {
    connection
        .prepare(
            "SELECT id, loan_number, branch_id, borrower_name, currency, principal, outstanding_balance, created_at
                FROM microcredit_loan WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], MicrocreditLoan::map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::LoanNotFound,
            error => error.into(),
        })
}

/// Record a repayment against a loan.
///
/// The payment row and the decrement of the loan's outstanding balance are
/// written in one SQL transaction with rollback on failure.
///
/// # Errors
/// Returns [Error::LoanNotFound] for an unknown loan,
/// [Error::PaymentCurrencyMismatch] if `currency` differs from the loan's,
/// [Error::NonPositiveAmount] for a non-positive amount, and
/// [Error::PaymentExceedsLoanBalance] if the amount is larger than what is
/// still owed. Nothing is written on failure.
pub fn record_payment(
    connection: &Connection,
    new_payment: &NewPayment,
) -> Result<MicrocreditPayment, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let loan = get_loan(&transaction, new_payment.loan_id)?;

    if new_payment.currency != loan.currency {
        return Err(Error::PaymentCurrencyMismatch);
    }
    if new_payment.amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }
    if new_payment.amount > loan.outstanding_balance {
        return Err(Error::PaymentExceedsLoanBalance);
    }

    let created_at = OffsetDateTime::now_utc();

    transaction.execute(
        "INSERT INTO microcredit_payment
            (loan_id, branch_id, cashier_id, currency, amount, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            loan.id,
            loan.branch_id,
            new_payment.cashier_id,
            loan.currency,
            new_payment.amount,
            TransactionStatus::Completed,
            created_at,
        ),
    )?;
    let payment_id = transaction.last_insert_rowid();

    transaction.execute(
        "UPDATE microcredit_loan SET outstanding_balance = outstanding_balance - ?1 WHERE id = ?2",
        (new_payment.amount, loan.id),
    )?;

    transaction.commit()?;

    tracing::info!(
        "Payment of {} {} recorded against loan {}",
        new_payment.amount,
        loan.currency,
        loan.loan_number
    );

    Ok(MicrocreditPayment {
        id: payment_id,
        loan_id: loan.id,
        branch_id: loan.branch_id,
        cashier_id: new_payment.cashier_id,
        currency: loan.currency,
        amount: new_payment.amount,
        status: TransactionStatus::Completed,
        created_at,
    })
}

/// A route handler for registering a loan.
pub async fn create_loan_endpoint(
    State(state): State<AppState>,
    Json(new_loan): Json<NewLoan>,
) -> Result<(StatusCode, Json<MicrocreditLoan>), Error> {
    let connection = state.connection()?;
    let loan = create_loan(&connection, &new_loan)?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// A route handler for recording a loan payment.
pub async fn create_payment_endpoint(
    State(state): State<AppState>,
    Json(new_payment): Json<NewPayment>,
) -> Result<(StatusCode, Json<MicrocreditPayment>), Error> {
    let connection = state.connection()?;
    let payment = record_payment(&connection, &new_payment)?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// A route handler for fetching a single loan.
pub async fn get_loan_endpoint(
    State(state): State<AppState>,
    Path(loan_id): Path<i64>,
) -> Result<Json<MicrocreditLoan>, Error> {
    let connection = state.connection()?;

    Ok(Json(get_loan(&connection, loan_id)?))
}
