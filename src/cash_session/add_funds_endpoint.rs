//! Defines the endpoint for recording a fund delivery to a branch vault.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState, Error,
    branch::BranchId,
    ledger::{AddFunds, BranchFundAddition, add_branch_funds},
};

/// A route handler for recording a fund delivery to a branch.
pub async fn add_branch_funds_endpoint(
    State(state): State<AppState>,
    Path(branch_id): Path<BranchId>,
    Json(request): Json<AddFunds>,
) -> Result<(StatusCode, Json<BranchFundAddition>), Error> {
    let connection = state.connection()?;
    let addition = add_branch_funds(&connection, branch_id, &request)?;

    Ok((StatusCode::CREATED, Json(addition)))
}
