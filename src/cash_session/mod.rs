//! Cash sessions: the drawer a cashier works out of for the day.
//!
//! A session is opened by a manager who hands the cashier an opening float in
//! one or both currencies, and closed by a manager who counts the drawer back
//! in. While a session is open its float counts as allocated branch cash.

mod add_funds_endpoint;
mod close_endpoint;
mod core;
mod open_endpoint;
mod sessions_endpoint;

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    branch::BranchId,
    db::{CreateTable, MapRow},
    user::UserId,
};

pub use add_funds_endpoint::add_branch_funds_endpoint;
pub use close_endpoint::close_session_endpoint;
pub use core::{
    CloseSession, OpenSessionForCashier, SessionCloseSummary, available_cashiers, close_session,
    list_branch_sessions, open_session,
};
pub use open_endpoint::open_session_endpoint;
pub use sessions_endpoint::{
    get_available_cashiers_endpoint, get_branch_sessions_endpoint, get_session_endpoint,
};

/// Whether a cash session is still accepting activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// The cashier is working out of the drawer.
    Open,
    /// The drawer has been counted back in by a manager.
    Closed,
}

impl rusqlite::ToSql for SessionStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>, rusqlite::Error> {
        let status = match self {
            SessionStatus::Open => "Open",
            SessionStatus::Closed => "Closed",
        };

        Ok(status.into())
    }
}

impl FromSql for SessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Open" => Ok(SessionStatus::Open),
            "Closed" => Ok(SessionStatus::Closed),
            other => Err(FromSqlError::Other(
                format!("unknown session status {other}").into(),
            )),
        }
    }
}

/// A cashier's working session over a cash drawer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashSession {
    /// The ID of the session.
    pub id: i64,
    /// The cashier working the drawer.
    pub user_id: UserId,
    /// The branch the drawer belongs to.
    pub branch_id: BranchId,
    /// The gourdes handed over when the session was opened.
    pub opening_htg: f64,
    /// The dollars handed over when the session was opened.
    pub opening_usd: f64,
    /// The gourdes counted back in at close, if closed.
    pub closing_htg: Option<f64>,
    /// The dollars counted back in at close, if closed.
    pub closing_usd: Option<f64>,
    /// Whether the session is open or closed.
    pub status: SessionStatus,
    /// When the session was opened.
    #[serde(with = "time::serde::rfc3339")]
    pub session_start: OffsetDateTime,
    /// When the session was closed, if closed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub session_end: Option<OffsetDateTime>,
    /// The audit trail of who opened and closed the session.
    pub notes: String,
}

impl CreateTable for CashSession {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE cash_session (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                branch_id INTEGER NOT NULL,
                opening_htg REAL NOT NULL,
                opening_usd REAL NOT NULL,
                closing_htg REAL,
                closing_usd REAL,
                status TEXT NOT NULL,
                session_start TEXT NOT NULL,
                session_end TEXT,
                notes TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id),
                FOREIGN KEY(branch_id) REFERENCES branch(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for CashSession {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            user_id: row.get(offset + 1)?,
            branch_id: row.get(offset + 2)?,
            opening_htg: row.get(offset + 3)?,
            opening_usd: row.get(offset + 4)?,
            closing_htg: row.get(offset + 5)?,
            closing_usd: row.get(offset + 6)?,
            status: row.get(offset + 7)?,
            session_start: row.get(offset + 8)?,
            session_end: row.get(offset + 9)?,
            notes: row.get(offset + 10)?,
        })
    }
}

const SELECT_SESSION: &str = "SELECT id, user_id, branch_id, opening_htg, opening_usd,
    closing_htg, closing_usd, status, session_start, session_end, notes
    FROM cash_session";

/// Retrieve a cash session by its `id`.
///
/// # Errors
/// Returns [Error::SessionNotFound] if `id` does not refer to a session.
pub fn get_session(connection: &Connection, id: i64) -> Result<CashSession, Error> {
    connection
        .prepare(&format!("{SELECT_SESSION} WHERE id = :id"))?
        .query_row(&[(":id", &id)], CashSession::map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::SessionNotFound,
            error => error.into(),
        })
}
