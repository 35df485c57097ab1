//! Inter-branch cash transfers and their approval workflow.
//!
//! A transfer moves vault cash from one branch to another through a reviewed
//! lifecycle: requested as `Pending`, then `Approved` or `Rejected` by a
//! manager, optionally marked `InTransit` while the cash is on the road, and
//! `Completed` on arrival. Balances move only on completion.

mod core;
mod create_endpoint;
mod transfers_endpoint;
mod workflow_endpoint;

use std::fmt::{self, Display, Formatter};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    branch::BranchId,
    currency::Currency,
    db::{CreateTable, MapRow},
    user::UserId,
};

pub use core::{
    CancelTransfer, NewTransfer, RejectTransfer, TransferAction, approve_transfer,
    cancel_transfer, complete_transfer, create_transfer, list_transfers, process_transfer,
    reject_transfer,
};
pub use create_endpoint::create_transfer_endpoint;
pub use transfers_endpoint::{TransferFilter, get_transfer_endpoint, list_transfers_endpoint};
pub use workflow_endpoint::{
    approve_transfer_endpoint, cancel_transfer_endpoint, complete_transfer_endpoint,
    process_transfer_endpoint, reject_transfer_endpoint,
};

/// Where a transfer sits in its approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Requested, awaiting a manager's decision.
    Pending,
    /// Approved; the cash is reserved but has not left the source vault.
    Approved,
    /// Turned down by a manager. Terminal.
    Rejected,
    /// The cash is on the road between branches.
    InTransit,
    /// The cash arrived and both balances have moved. Terminal.
    Completed,
    /// Withdrawn before completion. Terminal.
    Cancelled,
}

impl TransferStatus {
    /// Whether the lifecycle has ended and no further action is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Rejected | TransferStatus::Completed | TransferStatus::Cancelled
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "Pending",
            TransferStatus::Approved => "Approved",
            TransferStatus::Rejected => "Rejected",
            TransferStatus::InTransit => "InTransit",
            TransferStatus::Completed => "Completed",
            TransferStatus::Cancelled => "Cancelled",
        }
    }
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl rusqlite::ToSql for TransferStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>, rusqlite::Error> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransferStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Pending" => Ok(TransferStatus::Pending),
            "Approved" => Ok(TransferStatus::Approved),
            "Rejected" => Ok(TransferStatus::Rejected),
            "InTransit" => Ok(TransferStatus::InTransit),
            "Completed" => Ok(TransferStatus::Completed),
            "Cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(FromSqlError::Other(
                format!("unknown transfer status {other}").into(),
            )),
        }
    }
}

/// A cash movement between two branch vaults, with its full audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterBranchTransfer {
    /// The ID of the transfer.
    pub id: i64,
    /// The human-facing reference, e.g. "TRF-000027".
    pub transfer_number: String,
    /// The branch the cash leaves.
    pub from_branch_id: BranchId,
    /// The branch the cash arrives at.
    pub to_branch_id: BranchId,
    /// The currency being moved.
    pub currency: Currency,
    /// The amount being moved.
    pub amount: f64,
    /// The HTG/USD rate noted at request time, for reporting.
    pub exchange_rate: f64,
    /// Why the transfer was requested.
    pub reason: String,
    /// Where the transfer sits in its lifecycle.
    pub status: TransferStatus,
    /// The user who requested the transfer.
    pub requested_by: UserId,
    /// When the transfer was requested.
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    /// The manager who approved, if approved.
    pub approved_by: Option<UserId>,
    /// When the transfer was approved.
    #[serde(with = "time::serde::rfc3339::option")]
    pub approved_at: Option<OffsetDateTime>,
    /// The manager who rejected, if rejected.
    pub rejected_by: Option<UserId>,
    /// Why the transfer was rejected.
    pub rejection_reason: Option<String>,
    /// When the transfer was rejected.
    #[serde(with = "time::serde::rfc3339::option")]
    pub rejected_at: Option<OffsetDateTime>,
    /// The user who dispatched the cash, if dispatched.
    pub processed_by: Option<UserId>,
    /// When the cash was dispatched.
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
    /// The user who confirmed arrival, if completed.
    pub completed_by: Option<UserId>,
    /// When the transfer completed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// The user who cancelled, if cancelled.
    pub cancelled_by: Option<UserId>,
    /// Why the transfer was cancelled.
    pub cancellation_reason: Option<String>,
    /// When the transfer was cancelled.
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
}

impl CreateTable for InterBranchTransfer {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE inter_branch_transfer (
                id INTEGER PRIMARY KEY,
                transfer_number TEXT NOT NULL UNIQUE,
                from_branch_id INTEGER NOT NULL,
                to_branch_id INTEGER NOT NULL,
                currency TEXT NOT NULL,
                amount REAL NOT NULL,
                exchange_rate REAL NOT NULL,
                reason TEXT NOT NULL,
                status TEXT NOT NULL,
                requested_by INTEGER NOT NULL,
                requested_at TEXT NOT NULL,
                approved_by INTEGER,
                approved_at TEXT,
                rejected_by INTEGER,
                rejection_reason TEXT,
                rejected_at TEXT,
                processed_by INTEGER,
                processed_at TEXT,
                completed_by INTEGER,
                completed_at TEXT,
                cancelled_by INTEGER,
                cancellation_reason TEXT,
                cancelled_at TEXT,
                FOREIGN KEY(from_branch_id) REFERENCES branch(id),
                FOREIGN KEY(to_branch_id) REFERENCES branch(id),
                FOREIGN KEY(requested_by) REFERENCES user(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for InterBranchTransfer {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            transfer_number: row.get(offset + 1)?,
            from_branch_id: row.get(offset + 2)?,
            to_branch_id: row.get(offset + 3)?,
            currency: row.get(offset + 4)?,
            amount: row.get(offset + 5)?,
            exchange_rate: row.get(offset + 6)?,
            reason: row.get(offset + 7)?,
            status: row.get(offset + 8)?,
            requested_by: row.get(offset + 9)?,
            requested_at: row.get(offset + 10)?,
            approved_by: row.get(offset + 11)?,
            approved_at: row.get(offset + 12)?,
            rejected_by: row.get(offset + 13)?,
            rejection_reason: row.get(offset + 14)?,
            rejected_at: row.get(offset + 15)?,
            processed_by: row.get(offset + 16)?,
            processed_at: row.get(offset + 17)?,
            completed_by: row.get(offset + 18)?,
            completed_at: row.get(offset + 19)?,
            cancelled_by: row.get(offset + 20)?,
            cancellation_reason: row.get(offset + 21)?,
            cancelled_at: row.get(offset + 22)?,
        })
    }
}

const SELECT_TRANSFER: &str = "SELECT id, transfer_number, from_branch_id, to_branch_id,
    currency, amount, exchange_rate, reason, status, requested_by, requested_at,
    approved_by, approved_at, rejected_by, rejection_reason, rejected_at,
    processed_by, processed_at, completed_by, completed_at,
    cancelled_by, cancellation_reason, cancelled_at
    FROM inter_branch_transfer";

/// Retrieve a transfer by its `id`.
///
/// # Errors
/// Returns [Error::TransferNotFound] if `id` does not refer to a transfer.
pub fn get_transfer(connection: &Connection, id: i64) -> Result<InterBranchTransfer, Error> {
    connection
        .prepare(&format!("{SELECT_TRANSFER} WHERE id = :id"))?
        .query_row(&[(":id", &id)], InterBranchTransfer::map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransferNotFound,
            error => error.into(),
        })
}
