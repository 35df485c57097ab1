//! Defines the endpoint for closing a cash session.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{AppState, Error};

use super::{CloseSession, SessionCloseSummary, close_session};

/// A route handler for a manager closing a cash session.
pub async fn close_session_endpoint(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Json(request): Json<CloseSession>,
) -> Result<Json<SessionCloseSummary>, Error> {
    let connection = state.connection()?;
    let summary = close_session(&connection, session_id, &request)?;

    Ok(Json(summary))
}

#[cfg(test)]
mod close_session_endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState,
        branch::{NewBranch, create_branch},
        build_router,
        cash_session::{OpenSessionForCashier, open_session},
        currency::Currency,
        endpoints::{self, format_endpoint},
        ledger::{AddFunds, add_branch_funds},
        user::{NewUser, Role, create_user},
    };

    fn server_with_open_session() -> (TestServer, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn).unwrap();

        let (session_id, manager_id) = {
            let conn = state.connection().unwrap();
            let branch = create_branch(
                &conn,
                &NewBranch {
                    name: "Succursale Les Cayes".to_owned(),
                    code: "CAY".to_owned(),
                    primary_currency: Currency::HTG,
                },
            )
            .unwrap();
            let cashier = create_user(
                &conn,
                &NewUser {
                    first_name: "Dieunise".to_owned(),
                    last_name: "Étienne".to_owned(),
                    role: Role::Cashier,
                    branch_id: branch.id,
                },
            )
            .unwrap();
            let manager = create_user(
                &conn,
                &NewUser {
                    first_name: "Ronald".to_owned(),
                    last_name: "Saint-Fleur".to_owned(),
                    role: Role::Manager,
                    branch_id: branch.id,
                },
            )
            .unwrap();
            add_branch_funds(
                &conn,
                branch.id,
                &AddFunds {
                    added_by: manager.id,
                    amount_htg: 5_000.0,
                    amount_usd: 0.0,
                    notes: None,
                },
            )
            .unwrap();
            let session = open_session(
                &conn,
                &OpenSessionForCashier {
                    cashier_id: cashier.id,
                    manager_id: manager.id,
                    opening_htg: 2_000.0,
                    opening_usd: 0.0,
                    notes: None,
                },
            )
            .unwrap();

            (session.id, manager.id)
        };

        let server = TestServer::new(build_router(state));

        (server, session_id, manager_id)
    }

    #[tokio::test]
    async fn close_session_reports_variance() {
        let (server, session_id, manager_id) = server_with_open_session();

        let response = server
            .post(&format_endpoint(
                endpoints::CLOSE_SESSION_BY_MANAGER,
                session_id,
            ))
            .json(&json!({
                "manager_id": manager_id,
                "closing_htg": 1_900.0,
            }))
            .await;

        response.assert_status_ok();
        let summary: serde_json::Value = response.json();
        assert_eq!(summary["variance_htg"], -100.0);
        assert_eq!(summary["session"]["status"], "Closed");
    }

    #[tokio::test]
    async fn closing_unknown_session_is_not_found() {
        let (server, _, manager_id) = server_with_open_session();

        let response = server
            .post(&format_endpoint(endpoints::CLOSE_SESSION_BY_MANAGER, 404))
            .json(&json!({
                "manager_id": manager_id,
                "closing_htg": 0.0,
            }))
            .await;

        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
