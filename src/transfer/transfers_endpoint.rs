//! Defines the read endpoints for inter-branch transfers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{AppState, Error, branch::BranchId};

use super::{InterBranchTransfer, TransferStatus, get_transfer, list_transfers};

/// The query parameters for listing transfers.
#[derive(Debug, Deserialize)]
pub struct TransferFilter {
    /// Restrict the listing to transfers touching this branch.
    pub branch_id: Option<BranchId>,
    /// Restrict the listing to transfers in this state.
    pub status: Option<TransferStatus>,
}

/// A route handler for fetching a single transfer.
pub async fn get_transfer_endpoint(
    State(state): State<AppState>,
    Path(transfer_id): Path<i64>,
) -> Result<Json<InterBranchTransfer>, Error> {
    let connection = state.connection()?;

    Ok(Json(get_transfer(&connection, transfer_id)?))
}

/// A route handler for listing transfers, most recent first.
pub async fn list_transfers_endpoint(
    State(state): State<AppState>,
    Query(filter): Query<TransferFilter>,
) -> Result<Json<Vec<InterBranchTransfer>>, Error> {
    let connection = state.connection()?;

    Ok(Json(list_transfers(
        &connection,
        filter.branch_id,
        filter.status,
    )?))
}

#[cfg(test)]
mod transfers_endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        AppState,
        branch::{NewBranch, create_branch},
        build_router,
        currency::Currency,
        endpoints::{self, format_endpoint},
        transfer::{NewTransfer, create_transfer},
        user::{NewUser, Role, create_user},
    };

    fn test_server() -> (TestServer, i64) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn).unwrap();

        let transfer_id = {
            let conn = state.connection().unwrap();
            let from_branch = create_branch(
                &conn,
                &NewBranch {
                    name: "Succursale Petit-Goâve".to_owned(),
                    code: "PG".to_owned(),
                    primary_currency: Currency::HTG,
                },
            )
            .unwrap();
            let to_branch = create_branch(
                &conn,
                &NewBranch {
                    name: "Succursale Aquin".to_owned(),
                    code: "AQ".to_owned(),
                    primary_currency: Currency::HTG,
                },
            )
            .unwrap();
            let manager = create_user(
                &conn,
                &NewUser {
                    first_name: "Islande".to_owned(),
                    last_name: "Germain".to_owned(),
                    role: Role::Manager,
                    branch_id: from_branch.id,
                },
            )
            .unwrap();

            create_transfer(
                &conn,
                &NewTransfer {
                    from_branch_id: from_branch.id,
                    to_branch_id: to_branch.id,
                    currency: Currency::USD,
                    amount: 500.0,
                    exchange_rate: 132.5,
                    reason: "Demande de dollars".to_owned(),
                    requested_by: manager.id,
                },
            )
            .unwrap()
            .id
        };

        let server = TestServer::new(build_router(state));

        (server, transfer_id)
    }

    #[tokio::test]
    async fn get_transfer_returns_audit_fields() {
        let (server, transfer_id) = test_server();

        let response = server
            .get(&format_endpoint(endpoints::TRANSFER, transfer_id))
            .await;

        response.assert_status_ok();
        let transfer: serde_json::Value = response.json();
        assert_eq!(transfer["currency"], "USD");
        assert_eq!(transfer["status"], "Pending");
        assert!(transfer["approved_by"].is_null());
        assert!(transfer["requested_at"].is_string());
    }

    #[tokio::test]
    async fn list_transfers_supports_status_filter() {
        let (server, _) = test_server();

        let pending: Vec<serde_json::Value> = server
            .get(endpoints::TRANSFERS)
            .add_query_param("status", "Pending")
            .await
            .json();
        assert_eq!(pending.len(), 1);

        let completed: Vec<serde_json::Value> = server
            .get(endpoints::TRANSFERS)
            .add_query_param("status", "Completed")
            .await
            .json();
        assert!(completed.is_empty());
    }
}
