//! This file defines the `Branch` type and the API routes for managing
//! branches. Every ledger row, cash session and transfer belongs to a branch.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    currency::Currency,
    db::{CreateTable, MapRow},
};

/// The database ID of a branch.
pub type BranchId = i64;

/// A physical branch of the institution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
    /// The ID of the branch.
    pub id: BranchId,
    /// The display name, e.g. "Succursale Delmas".
    pub name: String,
    /// A short unique code, e.g. "DEL".
    pub code: String,
    /// The currency the branch primarily operates in.
    pub primary_currency: Currency,
    /// Whether the branch is operating.
    pub is_active: bool,
    /// When the branch was registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to register a branch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBranch {
    /// The display name.
    pub name: String,
    /// A short unique code.
    pub code: String,
    /// The currency the branch primarily operates in.
    pub primary_currency: Currency,
}

impl CreateTable for Branch {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE branch (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                primary_currency TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for Branch {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            code: row.get(offset + 2)?,
            primary_currency: row.get(offset + 3)?,
            is_active: row.get(offset + 4)?,
            created_at: row.get(offset + 5)?,
        })
    }
}

/// Insert a new branch into the database.
///
/// # Errors
/// Returns [Error::DuplicateBranchCode] if `code` is already in use.
pub fn create_branch(connection: &Connection, new_branch: &NewBranch) -> Result<Branch, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO branch (name, code, primary_currency, is_active, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)",
        (
            &new_branch.name,
            &new_branch.code,
            new_branch.primary_currency,
            created_at,
        ),
    )?;

    Ok(Branch {
        id: connection.last_insert_rowid(),
        name: new_branch.name.clone(),
        code: new_branch.code.clone(),
        primary_currency: new_branch.primary_currency,
        is_active: true,
        created_at,
    })
}

/// Retrieve a branch by its `id`.
///
/// # Errors
/// Returns [Error::BranchNotFound] if `id` does not refer to a branch.
pub fn get_branch(connection: &Connection, id: BranchId) -> Result<Branch, Error> {
    connection
        .prepare(
            "SELECT id, name, code, primary_currency, is_active, created_at
                FROM branch WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], Branch::map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::BranchNotFound,
            error => error.into(),
        })
}

/// Retrieve all branches, most recently registered first.
pub fn get_all_branches(connection: &Connection) -> Result<Vec<Branch>, Error> {
    connection
        .prepare(
            "SELECT id, name, code, primary_currency, is_active, created_at
                FROM branch ORDER BY id DESC",
        )?
        .query_map([], Branch::map_row)?
        .map(|maybe_branch| maybe_branch.map_err(Error::SqlError))
        .collect()
}

/// A route handler for registering a branch.
pub async fn create_branch_endpoint(
    State(state): State<AppState>,
    Json(new_branch): Json<NewBranch>,
) -> Result<(StatusCode, Json<Branch>), Error> {
    let connection = state.connection()?;
    let branch = create_branch(&connection, &new_branch)?;

    tracing::info!("Branch {} ({}) registered", branch.id, branch.code);

    Ok((StatusCode::CREATED, Json(branch)))
}

/// A route handler for listing all branches.
pub async fn get_branches_endpoint(
    State(state): State<AppState>,
) -> Result<Json<Vec<Branch>>, Error> {
    let connection = state.connection()?;

    Ok(Json(get_all_branches(&connection)?))
}

/// A route handler for fetching a single branch.
pub async fn get_branch_endpoint(
    State(state): State<AppState>,
    Path(branch_id): Path<BranchId>,
) -> Result<Json<Branch>, Error> {
    let connection = state.connection()?;

    Ok(Json(get_branch(&connection, branch_id)?))
}

#[cfg(test)]
mod branch_tests {
    use rusqlite::Connection;

    use crate::{Error, currency::Currency, db::initialize};

    use super::{NewBranch, create_branch, get_all_branches, get_branch};

    fn init_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn delmas() -> NewBranch {
        NewBranch {
            name: "Succursale Delmas".to_owned(),
            code: "DEL".to_owned(),
            primary_currency: Currency::HTG,
        }
    }

    #[test]
    fn create_and_get_branch() {
        let conn = init_db();

        let inserted = create_branch(&conn, &delmas()).unwrap();
        let selected = get_branch(&conn, inserted.id).unwrap();

        assert_eq!(inserted, selected);
        assert!(selected.is_active);
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let conn = init_db();
        create_branch(&conn, &delmas()).unwrap();

        let result = create_branch(&conn, &delmas());

        assert_eq!(result, Err(Error::DuplicateBranchCode));
    }

    #[test]
    fn get_missing_branch_fails() {
        let conn = init_db();

        assert_eq!(get_branch(&conn, 404), Err(Error::BranchNotFound));
    }

    #[test]
    fn list_returns_most_recent_first() {
        let conn = init_db();
        let first = create_branch(&conn, &delmas()).unwrap();
        let second = create_branch(
            &conn,
            &NewBranch {
                name: "Succursale Cap-Haïtien".to_owned(),
                code: "CAP".to_owned(),
                primary_currency: Currency::HTG,
            },
        )
        .unwrap();

        let branches = get_all_branches(&conn).unwrap();

        assert_eq!(branches, vec![second, first]);
    }
}
