//! The request and lifecycle operations for inter-branch transfers.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    balance::branch_balance,
    branch::{BranchId, get_branch},
    currency::Currency,
    db::MapRow,
    user::UserId,
};

use super::{InterBranchTransfer, SELECT_TRANSFER, TransferStatus, get_transfer};

/// The request body for creating a transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransfer {
    /// The branch the cash leaves.
    pub from_branch_id: BranchId,
    /// The branch the cash arrives at.
    pub to_branch_id: BranchId,
    /// The currency being moved.
    pub currency: Currency,
    /// The amount being moved. Must be positive.
    pub amount: f64,
    /// The HTG/USD rate to note on the transfer. Must be positive.
    pub exchange_rate: f64,
    /// Why the transfer is needed.
    pub reason: String,
    /// The user requesting the transfer.
    pub requested_by: UserId,
}

/// The request body for a lifecycle action that needs only an acting user.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferAction {
    /// The user performing the action.
    pub user_id: UserId,
}

/// The request body for rejecting a transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct RejectTransfer {
    /// The manager rejecting the transfer.
    pub user_id: UserId,
    /// Why the transfer is being turned down.
    pub reason: String,
}

/// The request body for cancelling a transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelTransfer {
    /// The user withdrawing the transfer.
    pub user_id: UserId,
    /// Why the transfer is being withdrawn.
    pub reason: Option<String>,
}

/// Request a transfer between two branches. The transfer starts `Pending`.
///
/// # Errors
/// Returns [Error::BranchNotFound] if either branch is unknown,
/// [Error::SameBranchTransfer] if both branch IDs match,
/// [Error::NonPositiveAmount] for a non-positive amount and
/// [Error::NonPositiveRate] for a non-positive rate.
pub fn create_transfer(
    connection: &Connection,
    new_transfer: &NewTransfer,
) -> Result<InterBranchTransfer, Error> {
    if new_transfer.from_branch_id == new_transfer.to_branch_id {
        return Err(Error::SameBranchTransfer);
    }
    if new_transfer.amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }
    if new_transfer.exchange_rate <= 0.0 {
        return Err(Error::NonPositiveRate);
    }

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    get_branch(&transaction, new_transfer.from_branch_id)?;
    get_branch(&transaction, new_transfer.to_branch_id)?;

    // The reference is derived from the next row id inside the transaction so
    // two concurrent requests cannot mint the same number.
    let next_id: i64 = transaction.query_row(
        "SELECT COALESCE(MAX(id), 0) + 1 FROM inter_branch_transfer",
        [],
        |row| row.get(0),
    )?;
    let transfer_number = format!("TRF-{next_id:06}");
    let requested_at = OffsetDateTime::now_utc();

    transaction.execute(
        "INSERT INTO inter_branch_transfer
            (transfer_number, from_branch_id, to_branch_id, currency, amount,
            exchange_rate, reason, status, requested_by, requested_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        (
            &transfer_number,
            new_transfer.from_branch_id,
            new_transfer.to_branch_id,
            new_transfer.currency,
            new_transfer.amount,
            new_transfer.exchange_rate,
            &new_transfer.reason,
            TransferStatus::Pending,
            new_transfer.requested_by,
            requested_at,
        ),
    )?;
    let id = transaction.last_insert_rowid();

    transaction.commit()?;

    tracing::info!(
        "Transfer {transfer_number} requested: {} {} from branch {} to branch {}",
        new_transfer.amount,
        new_transfer.currency,
        new_transfer.from_branch_id,
        new_transfer.to_branch_id
    );

    Ok(InterBranchTransfer {
        id,
        transfer_number,
        from_branch_id: new_transfer.from_branch_id,
        to_branch_id: new_transfer.to_branch_id,
        currency: new_transfer.currency,
        amount: new_transfer.amount,
        exchange_rate: new_transfer.exchange_rate,
        reason: new_transfer.reason.clone(),
        status: TransferStatus::Pending,
        requested_by: new_transfer.requested_by,
        requested_at,
        approved_by: None,
        approved_at: None,
        rejected_by: None,
        rejection_reason: None,
        rejected_at: None,
        processed_by: None,
        processed_at: None,
        completed_by: None,
        completed_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        cancelled_at: None,
    })
}

/// Approve a pending transfer.
///
/// The state check, the source branch's balance check and the status update
/// run in one SQL transaction. A failed approval leaves the transfer
/// `Pending`.
///
/// # Errors
/// Returns [Error::TransferNotFound] for an unknown transfer,
/// [Error::TransferStateConflict] if the transfer is not `Pending`, and
/// [Error::InsufficientFunds] if the source branch's available cash cannot
/// cover the amount.
pub fn approve_transfer(
    connection: &Connection,
    transfer_id: i64,
    action: &TransferAction,
) -> Result<InterBranchTransfer, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let transfer = get_transfer(&transaction, transfer_id)?;

    if transfer.status != TransferStatus::Pending {
        return Err(Error::TransferStateConflict {
            message: "Only pending transfers can be approved",
            status: transfer.status,
        });
    }

    let balance = branch_balance(&transaction, transfer.from_branch_id)?;
    let available = balance.available(transfer.currency);
    if transfer.amount > available {
        return Err(Error::InsufficientFunds {
            currency: transfer.currency,
            requested: transfer.amount,
            available,
        });
    }

    let approved_at = OffsetDateTime::now_utc();

    transaction.execute(
        "UPDATE inter_branch_transfer
            SET status = ?1, approved_by = ?2, approved_at = ?3 WHERE id = ?4",
        (
            TransferStatus::Approved,
            action.user_id,
            approved_at,
            transfer_id,
        ),
    )?;

    transaction.commit()?;

    tracing::info!(
        "Transfer {} approved by user {}",
        transfer.transfer_number,
        action.user_id
    );

    Ok(InterBranchTransfer {
        status: TransferStatus::Approved,
        approved_by: Some(action.user_id),
        approved_at: Some(approved_at),
        ..transfer
    })
}

/// Reject a pending transfer. Terminal.
///
/// # Errors
/// Returns [Error::TransferNotFound] for an unknown transfer and
/// [Error::TransferStateConflict] if the transfer is not `Pending`.
pub fn reject_transfer(
    connection: &Connection,
    transfer_id: i64,
    rejection: &RejectTransfer,
) -> Result<InterBranchTransfer, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let transfer = get_transfer(&transaction, transfer_id)?;

    if transfer.status != TransferStatus::Pending {
        return Err(Error::TransferStateConflict {
            message: "Only pending transfers can be rejected",
            status: transfer.status,
        });
    }

    let rejected_at = OffsetDateTime::now_utc();

    transaction.execute(
        "UPDATE inter_branch_transfer
            SET status = ?1, rejected_by = ?2, rejection_reason = ?3, rejected_at = ?4
            WHERE id = ?5",
        (
            TransferStatus::Rejected,
            rejection.user_id,
            &rejection.reason,
            rejected_at,
            transfer_id,
        ),
    )?;

    transaction.commit()?;

    Ok(InterBranchTransfer {
        status: TransferStatus::Rejected,
        rejected_by: Some(rejection.user_id),
        rejection_reason: Some(rejection.reason.clone()),
        rejected_at: Some(rejected_at),
        ..transfer
    })
}

/// Mark an approved transfer as dispatched, with the cash on the road.
///
/// # Errors
/// Returns [Error::TransferNotFound] for an unknown transfer and
/// [Error::TransferStateConflict] if the transfer is not `Approved`.
pub fn process_transfer(
    connection: &Connection,
    transfer_id: i64,
    action: &TransferAction,
) -> Result<InterBranchTransfer, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let transfer = get_transfer(&transaction, transfer_id)?;

    if transfer.status != TransferStatus::Approved {
        return Err(Error::TransferStateConflict {
            message: "Only approved transfers can be dispatched",
            status: transfer.status,
        });
    }

    let processed_at = OffsetDateTime::now_utc();

    transaction.execute(
        "UPDATE inter_branch_transfer
            SET status = ?1, processed_by = ?2, processed_at = ?3 WHERE id = ?4",
        (
            TransferStatus::InTransit,
            action.user_id,
            processed_at,
            transfer_id,
        ),
    )?;

    transaction.commit()?;

    Ok(InterBranchTransfer {
        status: TransferStatus::InTransit,
        processed_by: Some(action.user_id),
        processed_at: Some(processed_at),
        ..transfer
    })
}

/// Confirm that the cash arrived. Terminal; this is the step that moves the
/// branch balances.
///
/// # Errors
/// Returns [Error::TransferNotFound] for an unknown transfer and
/// [Error::TransferStateConflict] if the transfer is neither `Approved` nor
/// `InTransit`.
pub fn complete_transfer(
    connection: &Connection,
    transfer_id: i64,
    action: &TransferAction,
) -> Result<InterBranchTransfer, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let transfer = get_transfer(&transaction, transfer_id)?;

    if !matches!(
        transfer.status,
        TransferStatus::Approved | TransferStatus::InTransit
    ) {
        return Err(Error::TransferStateConflict {
            message: "Only approved or in-transit transfers can be completed",
            status: transfer.status,
        });
    }

    let completed_at = OffsetDateTime::now_utc();

    transaction.execute(
        "UPDATE inter_branch_transfer
            SET status = ?1, completed_by = ?2, completed_at = ?3 WHERE id = ?4",
        (
            TransferStatus::Completed,
            action.user_id,
            completed_at,
            transfer_id,
        ),
    )?;

    transaction.commit()?;

    tracing::info!(
        "Transfer {} completed: {} {} moved from branch {} to branch {}",
        transfer.transfer_number,
        transfer.amount,
        transfer.currency,
        transfer.from_branch_id,
        transfer.to_branch_id
    );

    Ok(InterBranchTransfer {
        status: TransferStatus::Completed,
        completed_by: Some(action.user_id),
        completed_at: Some(completed_at),
        ..transfer
    })
}

/// Withdraw a transfer that has not reached a terminal state. Terminal.
///
/// # Errors
/// Returns [Error::TransferNotFound] for an unknown transfer and
/// [Error::TransferStateConflict] if the transfer already ended.
pub fn cancel_transfer(
    connection: &Connection,
    transfer_id: i64,
    cancellation: &CancelTransfer,
) -> Result<InterBranchTransfer, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let transfer = get_transfer(&transaction, transfer_id)?;

    if transfer.status.is_terminal() {
        return Err(Error::TransferStateConflict {
            message: "This transfer has already ended and cannot be cancelled",
            status: transfer.status,
        });
    }

    let cancelled_at = OffsetDateTime::now_utc();

    transaction.execute(
        "UPDATE inter_branch_transfer
            SET status = ?1, cancelled_by = ?2, cancellation_reason = ?3, cancelled_at = ?4
            WHERE id = ?5",
        (
            TransferStatus::Cancelled,
            cancellation.user_id,
            &cancellation.reason,
            cancelled_at,
            transfer_id,
        ),
    )?;

    transaction.commit()?;

    Ok(InterBranchTransfer {
        status: TransferStatus::Cancelled,
        cancelled_by: Some(cancellation.user_id),
        cancellation_reason: cancellation.reason.clone(),
        cancelled_at: Some(cancelled_at),
        ..transfer
    })
}

/// List transfers, most recent first, optionally narrowed to one branch
/// (either direction) and one status.
pub fn list_transfers(
    connection: &Connection,
    branch_id: Option<BranchId>,
    status: Option<TransferStatus>,
) -> Result<Vec<InterBranchTransfer>, Error> {
    let mut sql = format!("{SELECT_TRANSFER} WHERE 1 = 1");
    let mut params: Vec<(&str, &dyn rusqlite::ToSql)> = Vec::new();

    if let Some(branch_id) = &branch_id {
        sql.push_str(" AND (from_branch_id = :branch_id OR to_branch_id = :branch_id)");
        params.push((":branch_id", branch_id));
    }
    if let Some(status) = &status {
        sql.push_str(" AND status = :status");
        params.push((":status", status));
    }
    sql.push_str(" ORDER BY id DESC");

    let transfers = connection
        .prepare(&sql)?
        .query_map(params.as_slice(), InterBranchTransfer::map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transfers)
}
