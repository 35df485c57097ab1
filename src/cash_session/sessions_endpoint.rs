//! Defines the read endpoints for cash sessions.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{AppState, Error, branch::BranchId, user::User};

use super::{
    CashSession, SessionStatus, available_cashiers, get_session, list_branch_sessions,
};

/// The query parameters for listing a branch's sessions.
#[derive(Debug, Deserialize)]
pub struct SessionFilter {
    /// Restrict the listing to sessions in this state.
    pub status: Option<SessionStatus>,
}

/// A route handler for fetching a single cash session.
pub async fn get_session_endpoint(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<Json<CashSession>, Error> {
    let connection = state.connection()?;

    Ok(Json(get_session(&connection, session_id)?))
}

/// A route handler for listing a branch's cash sessions, most recent first.
pub async fn get_branch_sessions_endpoint(
    State(state): State<AppState>,
    Path(branch_id): Path<BranchId>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Vec<CashSession>>, Error> {
    let connection = state.connection()?;

    Ok(Json(list_branch_sessions(
        &connection,
        branch_id,
        filter.status,
    )?))
}

/// A route handler for listing a branch's cashiers that can take a session.
pub async fn get_available_cashiers_endpoint(
    State(state): State<AppState>,
    Path(branch_id): Path<BranchId>,
) -> Result<Json<Vec<User>>, Error> {
    let connection = state.connection()?;

    Ok(Json(available_cashiers(&connection, branch_id)?))
}

#[cfg(test)]
mod sessions_endpoint_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        AppState,
        branch::{NewBranch, create_branch},
        build_router,
        cash_session::{CloseSession, OpenSessionForCashier, close_session, open_session},
        currency::Currency,
        endpoints::{self, format_endpoint},
        ledger::{AddFunds, add_branch_funds},
        user::{NewUser, Role, create_user},
    };

    fn test_server() -> (TestServer, i64) {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn).unwrap();

        let branch_id = {
            let conn = state.connection().unwrap();
            let branch = create_branch(
                &conn,
                &NewBranch {
                    name: "Succursale Jérémie".to_owned(),
                    code: "JER".to_owned(),
                    primary_currency: Currency::HTG,
                },
            )
            .unwrap();
            let manager = create_user(
                &conn,
                &NewUser {
                    first_name: "Micheline".to_owned(),
                    last_name: "Bellevue".to_owned(),
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
                    amount_htg: 20_000.0,
                    amount_usd: 0.0,
                    notes: None,
                },
            )
            .unwrap();

            for (first_name, close_after) in [("Josette", true), ("Wilner", false)] {
                let cashier = create_user(
                    &conn,
                    &NewUser {
                        first_name: first_name.to_owned(),
                        last_name: "Toussaint".to_owned(),
                        role: Role::Cashier,
                        branch_id: branch.id,
                    },
                )
                .unwrap();
                let session = open_session(
                    &conn,
                    &OpenSessionForCashier {
                        cashier_id: cashier.id,
                        manager_id: manager.id,
                        opening_htg: 1_000.0,
                        opening_usd: 0.0,
                        notes: None,
                    },
                )
                .unwrap();
                if close_after {
                    close_session(
                        &conn,
                        session.id,
                        &CloseSession {
                            manager_id: manager.id,
                            closing_htg: 1_000.0,
                            closing_usd: 0.0,
                            notes: None,
                        },
                    )
                    .unwrap();
                }
            }

            branch.id
        };

        let server = TestServer::new(build_router(state));

        (server, branch_id)
    }

    #[tokio::test]
    async fn branch_sessions_can_be_filtered_by_status() {
        let (server, branch_id) = test_server();

        let all: Vec<serde_json::Value> = server
            .get(&format_endpoint(endpoints::BRANCH_CASH_SESSIONS, branch_id))
            .await
            .json();
        assert_eq!(all.len(), 2);

        let open: Vec<serde_json::Value> = server
            .get(&format_endpoint(endpoints::BRANCH_CASH_SESSIONS, branch_id))
            .add_query_param("status", "Open")
            .await
            .json();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0]["status"], "Open");
    }

    #[tokio::test]
    async fn available_cashiers_lists_only_free_cashiers() {
        let (server, branch_id) = test_server();

        // Josette closed her session; Wilner still has his open.
        let available: Vec<serde_json::Value> = server
            .get(&format_endpoint(endpoints::AVAILABLE_CASHIERS, branch_id))
            .await
            .json();

        assert_eq!(available.len(), 1);
        assert_eq!(available[0]["first_name"], "Josette");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (server, _) = test_server();

        server
            .get(&format_endpoint(endpoints::CASH_SESSION, 404))
            .await
            .assert_status(axum::http::StatusCode::NOT_FOUND);
    }
}
