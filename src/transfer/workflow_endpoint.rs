//! Defines the lifecycle endpoints for inter-branch transfers.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{AppState, Error};

use super::{
    CancelTransfer, InterBranchTransfer, RejectTransfer, TransferAction, approve_transfer,
    cancel_transfer, complete_transfer, process_transfer, reject_transfer,
};

/// A route handler for approving a pending transfer.
pub async fn approve_transfer_endpoint(
    State(state): State<AppState>,
    Path(transfer_id): Path<i64>,
    Json(action): Json<TransferAction>,
) -> Result<Json<InterBranchTransfer>, Error> {
    let connection = state.connection()?;

    Ok(Json(approve_transfer(&connection, transfer_id, &action)?))
}

/// A route handler for rejecting a pending transfer.
pub async fn reject_transfer_endpoint(
    State(state): State<AppState>,
    Path(transfer_id): Path<i64>,
    Json(rejection): Json<RejectTransfer>,
) -> Result<Json<InterBranchTransfer>, Error> {
    let connection = state.connection()?;

    Ok(Json(reject_transfer(&connection, transfer_id, &rejection)?))
}

/// A route handler for marking an approved transfer as dispatched.
pub async fn process_transfer_endpoint(
    State(state): State<AppState>,
    Path(transfer_id): Path<i64>,
    Json(action): Json<TransferAction>,
) -> Result<Json<InterBranchTransfer>, Error> {
    let connection = state.connection()?;

    Ok(Json(process_transfer(&connection, transfer_id, &action)?))
}

/// A route handler for confirming a transfer's arrival.
pub async fn complete_transfer_endpoint(
    State(state): State<AppState>,
    Path(transfer_id): Path<i64>,
    Json(action): Json<TransferAction>,
) -> Result<Json<InterBranchTransfer>, Error> {
    let connection = state.connection()?;

    Ok(Json(complete_transfer(&connection, transfer_id, &action)?))
}

/// A route handler for cancelling a transfer that has not ended.
pub async fn cancel_transfer_endpoint(
    State(state): State<AppState>,
    Path(transfer_id): Path<i64>,
    Json(cancellation): Json<CancelTransfer>,
) -> Result<Json<InterBranchTransfer>, Error> {
    let connection = state.connection()?;

    Ok(Json(cancel_transfer(
        &connection,
        transfer_id,
        &cancellation,
    )?))
}
