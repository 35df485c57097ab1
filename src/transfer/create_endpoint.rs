//! Defines the endpoint for requesting an inter-branch transfer.

use axum::{Json, extract::State, http::StatusCode};

use crate::{AppState, Error};

use super::{InterBranchTransfer, NewTransfer, create_transfer};

/// A route handler for requesting a transfer between two branches.
pub async fn create_transfer_endpoint(
    State(state): State<AppState>,
    Json(new_transfer): Json<NewTransfer>,
) -> Result<(StatusCode, Json<InterBranchTransfer>), Error> {
    let connection = state.connection()?;
    let transfer = create_transfer(&connection, &new_transfer)?;

    Ok((StatusCode::CREATED, Json(transfer)))
}

#[cfg(test)]
mod create_transfer_endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState,
        branch::{NewBranch, create_branch},
        build_router,
        currency::Currency,
        endpoints,
        user::{NewUser, Role, create_user},
    };

    fn test_server() -> (TestServer, i64, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn).unwrap();

        let (from_branch, to_branch, manager_id) = {
            let conn = state.connection().unwrap();
            let from_branch = create_branch(
                &conn,
                &NewBranch {
                    name: "Succursale Miragoâne".to_owned(),
                    code: "MIR".to_owned(),
                    primary_currency: Currency::HTG,
                },
            )
            .unwrap();
            let to_branch = create_branch(
                &conn,
                &NewBranch {
                    name: "Succursale Fort-Liberté".to_owned(),
                    code: "FL".to_owned(),
                    primary_currency: Currency::HTG,
                },
            )
            .unwrap();
            let manager = create_user(
                &conn,
                &NewUser {
                    first_name: "Jocelyne".to_owned(),
                    last_name: "Alexis".to_owned(),
                    role: Role::Manager,
                    branch_id: from_branch.id,
                },
            )
            .unwrap();

            (from_branch.id, to_branch.id, manager.id)
        };

        let server = TestServer::new(build_router(state));

        (server, from_branch, to_branch, manager_id)
    }

    #[tokio::test]
    async fn create_transfer_returns_created_with_reference() {
        let (server, from_branch, to_branch, manager_id) = test_server();

        let response = server
            .post(endpoints::TRANSFERS)
            .json(&json!({
                "from_branch_id": from_branch,
                "to_branch_id": to_branch,
                "currency": "HTG",
                "amount": 25_000.0,
                "exchange_rate": 132.5,
                "reason": "Réapprovisionnement",
                "requested_by": manager_id,
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let transfer: serde_json::Value = response.json();
        assert_eq!(transfer["transfer_number"], "TRF-000001");
        assert_eq!(transfer["status"], "Pending");
    }

    #[tokio::test]
    async fn transfer_to_unknown_branch_is_not_found() {
        let (server, from_branch, _, manager_id) = test_server();

        let response = server
            .post(endpoints::TRANSFERS)
            .json(&json!({
                "from_branch_id": from_branch,
                "to_branch_id": 404,
                "currency": "HTG",
                "amount": 25_000.0,
                "exchange_rate": 132.5,
                "reason": "Réapprovisionnement",
                "requested_by": manager_id,
            }))
            .await;

        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
