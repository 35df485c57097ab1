//! This file defines the `User` type (branch staff) and the API routes for
//! managing users.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    branch::BranchId,
    db::{CreateTable, MapRow},
};

/// The database ID of a user.
pub type UserId = i64;

/// The role a staff member holds within the institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Operates a till; the only role a cash session can be opened for.
    Cashier,
    /// Runs a branch; opens and closes cash sessions for cashiers.
    Manager,
    /// Manages branches and transfers.
    Admin,
    /// Head office; the only role that can inject funds into a branch.
    SuperAdmin,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Cashier => "Cashier",
            Role::Manager => "Manager",
            Role::Admin => "Admin",
            Role::SuperAdmin => "SuperAdmin",
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Cashier" => Ok(Role::Cashier),
            "Manager" => Ok(Role::Manager),
            "Admin" => Ok(Role::Admin),
            "SuperAdmin" => Ok(Role::SuperAdmin),
            other => Err(FromSqlError::Other(
                format!("unknown role \"{other}\"").into(),
            )),
        }
    }
}

/// A staff member attached to a branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// The ID of the user.
    pub id: UserId,
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
    /// The role the user holds.
    pub role: Role,
    /// The branch the user works at.
    pub branch_id: BranchId,
    /// Whether the user may operate.
    pub is_active: bool,
}

impl User {
    /// The user's full name, as shown in session and transfer summaries.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The data needed to register a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
    /// The role the user holds.
    pub role: Role,
    /// The branch the user works at.
    pub branch_id: BranchId,
}

impl CreateTable for User {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE user (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                role TEXT NOT NULL,
                branch_id INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                FOREIGN KEY(branch_id) REFERENCES branch(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for User {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            first_name: row.get(offset + 1)?,
            last_name: row.get(offset + 2)?,
            role: row.get(offset + 3)?,
            branch_id: row.get(offset + 4)?,
            is_active: row.get(offset + 5)?,
        })
    }
}

/// Insert a new user into the database.
///
/// # Errors
/// Returns [Error::InvalidForeignKey] if `branch_id` does not refer to a
/// branch.
pub fn create_user(connection: &Connection, new_user: &NewUser) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (first_name, last_name, role, branch_id, is_active)
            VALUES (?1, ?2, ?3, ?4, 1)",
        (
            &new_user.first_name,
            &new_user.last_name,
            new_user.role,
            new_user.branch_id,
        ),
    )?;

    Ok(User {
        id: connection.last_insert_rowid(),
        first_name: new_user.first_name.clone(),
        last_name: new_user.last_name.clone(),
        role: new_user.role,
        branch_id: new_user.branch_id,
        is_active: true,
    })
}

/// Retrieve a user by their `id`.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn get_user(connection: &Connection, id: UserId) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, first_name, last_name, role, branch_id, is_active
                FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], User::map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

/// Set a user's active flag.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn set_user_active(connection: &Connection, id: UserId, is_active: bool) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE user SET is_active = ?1 WHERE id = ?2",
        (is_active, id),
    )?;

    if rows_updated == 0 {
        return Err(Error::UserNotFound);
    }

    Ok(())
}

/// A route handler for registering a user.
pub async fn create_user_endpoint(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), Error> {
    let connection = state.connection()?;
    let user = create_user(&connection, &new_user)?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// A route handler for fetching a single user.
pub async fn get_user_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<User>, Error> {
    let connection = state.connection()?;

    Ok(Json(get_user(&connection, user_id)?))
}
