//! The ledger tables: every append-oriented record of money movement that
//! contributes to a branch's cash balance.
//!
//! Each table is tagged with a branch, a [Currency](crate::currency::Currency),
//! a transaction type and a status. Only `Completed` rows count toward the
//! balance computed by [branch_balance](crate::balance::branch_balance).

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

mod accounts;
mod exchange;
mod fund_addition;
mod microcredit;
mod transaction;

pub use accounts::{
    AccountKind, AccountTransaction, NewAccountTransaction, create_account_transaction_endpoint,
    record_account_transaction,
};
pub use exchange::{
    ExchangeResult, ExchangeTransaction, NewExchange, create_exchange_endpoint, record_exchange,
};
pub use fund_addition::{AddFunds, BranchFundAddition, add_branch_funds};
pub use microcredit::{
    MicrocreditLoan, MicrocreditPayment, NewLoan, NewPayment, create_loan, create_loan_endpoint,
    create_payment_endpoint, get_loan, get_loan_endpoint, record_payment,
};
pub use transaction::{
    LedgerTransaction, NewTransaction, create_transaction_endpoint, record_transaction,
};

/// Whether a ledger row moves cash into or out of the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Cash taken in by the teller.
    Deposit,
    /// Cash paid out by the teller.
    Withdrawal,
}

impl TransactionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Deposit" => Ok(TransactionType::Deposit),
            "Withdrawal" => Ok(TransactionType::Withdrawal),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// The lifecycle state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Recorded but not yet settled; does not count toward the balance.
    Pending,
    /// Settled; counts toward the balance.
    Completed,
    /// Voided; does not count toward the balance.
    Cancelled,
}

impl TransactionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Cancelled => "Cancelled",
        }
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Pending" => Ok(TransactionStatus::Pending),
            "Completed" => Ok(TransactionStatus::Completed),
            "Cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(FromSqlError::Other(
                format!("unknown transaction status \"{other}\"").into(),
            )),
        }
    }
}

impl Default for TransactionStatus {
    /// Teller-recorded rows settle immediately unless stated otherwise.
    fn default() -> Self {
        TransactionStatus::Completed
    }
}
