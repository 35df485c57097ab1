//! Kesye is a back-office HTTP API for multi-branch cash operations in two
//! currencies (HTG and USD): teller ledgers, cash sessions, SuperAdmin fund
//! injections and inter-branch transfers.
//!
//! The heart of the crate is [balance::branch_balance], which aggregates every
//! ledger table into a per-currency available figure. Cash session opening and
//! transfer approval both validate against that figure before allocating
//! funds, inside the same SQL transaction as the write.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod balance;
mod branch;
mod cash_session;
mod currency;
mod db;
mod endpoints;
mod ledger;
mod routing;
mod transfer;
mod user;

pub use app_state::AppState;
pub use routing::build_router;

use crate::{currency::Currency, transfer::TransferStatus};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
///
/// User-facing messages are in French, matching what the branch staff see in
/// their client applications.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested branch does not exist.
    #[error("Succursale non trouvée")]
    BranchNotFound,

    /// The requested user does not exist.
    #[error("Utilisateur non trouvé")]
    UserNotFound,

    /// The cashier selected for a cash session does not exist.
    #[error("Caissier non trouvé")]
    CashierNotFound,

    /// The requested cash session does not exist.
    #[error("Session de caisse non trouvée")]
    SessionNotFound,

    /// The requested inter-branch transfer does not exist.
    #[error("Transfert non trouvé")]
    TransferNotFound,

    /// The requested microcredit loan does not exist.
    #[error("Prêt non trouvé")]
    LoanNotFound,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows. Call
    /// sites that know which resource was being looked up should map it to
    /// the resource-specific variant.
    #[error("Ressource non trouvée")]
    NotFound,

    /// A branch was created with a code that is already in use.
    #[error("Ce code de succursale est déjà utilisé")]
    DuplicateBranchCode,

    /// The user selected for a cash session does not have the Cashier role.
    #[error("L'utilisateur sélectionné n'est pas un caissier")]
    NotACashier,

    /// The cashier selected for a cash session is deactivated.
    #[error("Le caissier est inactif")]
    InactiveCashier,

    /// The cashier already has an open cash session.
    #[error("Ce caissier a déjà une session ouverte")]
    SessionAlreadyOpen,

    /// The session is not open, so it cannot be closed.
    #[error("Cette session n'est pas ouverte")]
    SessionNotOpen,

    /// A requested allocation exceeds the branch's available balance for the
    /// currency.
    #[error(
        "Le montant demandé ({requested} {currency}) dépasse le solde disponible ({available} {currency})"
    )]
    InsufficientFunds {
        /// The currency the allocation was requested in.
        currency: Currency,
        /// The amount that was requested.
        requested: f64,
        /// The amount the branch actually has available.
        available: f64,
    },

    /// A ledger amount was zero or negative.
    #[error("Le montant doit être supérieur à zéro")]
    NonPositiveAmount,

    /// An opening or closing balance was negative.
    #[error("Le montant ne peut pas être négatif")]
    NegativeAmount,

    /// An exchange rate was zero or negative.
    #[error("Le taux de change doit être supérieur à 0")]
    NonPositiveRate,

    /// A currency exchange was requested with the same source and target
    /// currency.
    #[error("Les devises source et cible doivent être différentes")]
    SameCurrencyExchange,

    /// A transfer was requested between a branch and itself.
    #[error("La succursale source et destination doivent être différentes")]
    SameBranchTransfer,

    /// A fund addition with neither an HTG nor a USD amount.
    #[error("Au moins un des montants doit être supérieur à zéro")]
    EmptyFundAddition,

    /// A microcredit payment larger than the loan's outstanding balance.
    #[error("Le montant dépasse le solde restant du prêt")]
    PaymentExceedsLoanBalance,

    /// A microcredit payment in a different currency than the loan.
    #[error("La devise du paiement doit correspondre à celle du prêt")]
    PaymentCurrencyMismatch,

    /// A transfer workflow action was attempted from the wrong status.
    ///
    /// The message names the allowed statuses for the attempted action, e.g.
    /// "Only pending transfers can be approved".
    #[error("{message} (current status: {status})")]
    TransferStateConflict {
        /// Which statuses the action is valid from.
        message: &'static str,
        /// The status the transfer is actually in.
        status: TransferStatus,
    },

    /// A query was given an invalid foreign key, e.g. a ledger row for a
    /// branch id that does not exist.
    #[error("Référence invalide")]
    InvalidForeignKey,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_))
                if sql_error.extended_code == 787 =>
            {
                Error::InvalidForeignKey
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("branch.code") =>
            {
                Error::DuplicateBranchCode
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => Error::SqlError(error),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = match self {
            Error::BranchNotFound
            | Error::UserNotFound
            | Error::CashierNotFound
            | Error::SessionNotFound
            | Error::TransferNotFound
            | Error::LoanNotFound
            | Error::NotFound => StatusCode::NOT_FOUND,
            Error::SessionAlreadyOpen
            | Error::SessionNotOpen
            | Error::TransferStateConflict { .. } => StatusCode::CONFLICT,
            Error::SqlError(_) | Error::DatabaseLockError => {
                // These are not intended to be shown to the client.
                tracing::error!("An unexpected error occurred: {}", self);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Une erreur interne s'est produite" })),
                )
                    .into_response();
            }
            _ => StatusCode::BAD_REQUEST,
        };

        (status_code, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
