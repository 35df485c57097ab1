//! Defines the endpoint for opening a cash session on a cashier's behalf.

use axum::{Json, extract::State, http::StatusCode};

use crate::{AppState, Error};

use super::{CashSession, OpenSessionForCashier, open_session};

/// A route handler for a manager opening a cash session for a cashier.
pub async fn open_session_endpoint(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionForCashier>,
) -> Result<(StatusCode, Json<CashSession>), Error> {
    let connection = state.connection()?;
    let session = open_session(&connection, &request)?;

    Ok((StatusCode::CREATED, Json(session)))
}
