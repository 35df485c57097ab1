//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState,
    balance::get_branch_balance_endpoint,
    branch::{create_branch_endpoint, get_branch_endpoint, get_branches_endpoint},
    cash_session::{
        add_branch_funds_endpoint, close_session_endpoint, get_available_cashiers_endpoint,
        get_branch_sessions_endpoint, get_session_endpoint, open_session_endpoint,
    },
    endpoints,
    ledger::{
        create_account_transaction_endpoint, create_exchange_endpoint, create_loan_endpoint,
        create_payment_endpoint, create_transaction_endpoint, get_loan_endpoint,
    },
    transfer::{
        approve_transfer_endpoint, cancel_transfer_endpoint, complete_transfer_endpoint,
        create_transfer_endpoint, get_transfer_endpoint, list_transfers_endpoint,
        process_transfer_endpoint, reject_transfer_endpoint,
    },
    user::{create_user_endpoint, get_user_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::BRANCHES,
            get(get_branches_endpoint).post(create_branch_endpoint),
        )
        .route(endpoints::BRANCH, get(get_branch_endpoint))
        .route(endpoints::BRANCH_BALANCE, get(get_branch_balance_endpoint))
        .route(endpoints::USERS, post(create_user_endpoint))
        .route(endpoints::USER, get(get_user_endpoint))
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint))
        .route(
            endpoints::ACCOUNT_TRANSACTIONS,
            post(create_account_transaction_endpoint),
        )
        .route(endpoints::EXCHANGES, post(create_exchange_endpoint))
        .route(endpoints::MICROCREDIT_LOANS, post(create_loan_endpoint))
        .route(endpoints::MICROCREDIT_LOAN, get(get_loan_endpoint))
        .route(
            endpoints::MICROCREDIT_PAYMENTS,
            post(create_payment_endpoint),
        )
        .route(
            endpoints::OPEN_SESSION_FOR_CASHIER,
            post(open_session_endpoint),
        )
        .route(
            endpoints::CLOSE_SESSION_BY_MANAGER,
            post(close_session_endpoint),
        )
        .route(endpoints::CASH_SESSION, get(get_session_endpoint))
        .route(
            endpoints::BRANCH_CASH_SESSIONS,
            get(get_branch_sessions_endpoint),
        )
        .route(endpoints::ADD_BRANCH_FUNDS, post(add_branch_funds_endpoint))
        .route(
            endpoints::AVAILABLE_CASHIERS,
            get(get_available_cashiers_endpoint),
        )
        .route(
            endpoints::TRANSFERS,
            get(list_transfers_endpoint).post(create_transfer_endpoint),
        )
        .route(endpoints::TRANSFER, get(get_transfer_endpoint))
        .route(endpoints::APPROVE_TRANSFER, post(approve_transfer_endpoint))
        .route(endpoints::REJECT_TRANSFER, post(reject_transfer_endpoint))
        .route(endpoints::PROCESS_TRANSFER, post(process_transfer_endpoint))
        .route(
            endpoints::COMPLETE_TRANSFER,
            post(complete_transfer_endpoint),
        )
        .route(endpoints::CANCEL_TRANSFER, post(cancel_transfer_endpoint))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Ressource non trouvée" })),
    )
}

#[cfg(test)]
mod routing_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::AppState;

    use super::build_router;

    fn test_server() -> TestServer {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::new(conn).unwrap();

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let server = test_server();

        let response = server.get("/api/does-not-exist").await;

        response.assert_status(axum::http::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Ressource non trouvée");
    }

    #[tokio::test]
    async fn branches_route_is_wired() {
        let server = test_server();

        let response = server.get(crate::endpoints::BRANCHES).await;

        response.assert_status_ok();
        let branches: Vec<serde_json::Value> = response.json();
        assert!(branches.is_empty());
    }
}
