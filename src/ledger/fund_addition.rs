//! Head-office fund injections into a branch vault.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    branch::{BranchId, get_branch},
    db::{CreateTable, MapRow},
    user::UserId,
};

/// Cash delivered to a branch from outside the branch's own operations.
///
/// Unlike teller transactions, an addition can carry both currencies at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchFundAddition {
    /// The ID of the fund addition.
    pub id: i64,
    /// The branch the funds were delivered to.
    pub branch_id: BranchId,
    /// The manager who recorded the delivery.
    pub added_by: UserId,
    /// The gourdes delivered. Zero if the delivery was USD only.
    pub amount_htg: f64,
    /// The dollars delivered. Zero if the delivery was HTG only.
    pub amount_usd: f64,
    /// Free-form note, e.g. the armored-car voucher number.
    pub notes: Option<String>,
    /// Whether the funds have been handed out to an open cash session.
    pub is_allocated: bool,
    /// When the delivery was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to record a fund addition.
#[derive(Debug, Clone, Deserialize)]
pub struct AddFunds {
    /// The manager recording the delivery.
    pub added_by: UserId,
    /// The gourdes delivered.
    #[serde(default)]
    pub amount_htg: f64,
    /// The dollars delivered.
    #[serde(default)]
    pub amount_usd: f64,
    /// Free-form note.
    pub notes: Option<String>,
}

impl CreateTable for BranchFundAddition {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE branch_fund_addition (
                id INTEGER PRIMARY KEY,
                branch_id INTEGER NOT NULL,
                added_by INTEGER NOT NULL,
                amount_htg REAL NOT NULL,
                amount_usd REAL NOT NULL,
                notes TEXT,
                is_allocated INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY(branch_id) REFERENCES branch(id),
                FOREIGN KEY(added_by) REFERENCES user(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for BranchFundAddition {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            branch_id: row.get(offset + 1)?,
            added_by: row.get(offset + 2)?,
            amount_htg: row.get(offset + 3)?,
            amount_usd: row.get(offset + 4)?,
            notes: row.get(offset + 5)?,
            is_allocated: row.get(offset + 6)?,
            created_at: row.get(offset + 7)?,
        })
    }
}

/// Record a fund delivery to `branch_id`.
///
/// # Errors
/// Returns [Error::BranchNotFound] for an unknown branch,
/// [Error::NegativeAmount] if either amount is negative, and
/// [Error::EmptyFundAddition] if both amounts are zero.
pub fn add_branch_funds(
    connection: &Connection,
    branch_id: BranchId,
    add_funds: &AddFunds,
) -> Result<BranchFundAddition, Error> {
    if add_funds.amount_htg < 0.0 || add_funds.amount_usd < 0.0 {
        return Err(Error::NegativeAmount);
    }
    if add_funds.amount_htg == 0.0 && add_funds.amount_usd == 0.0 {
        return Err(Error::EmptyFundAddition);
    }

    get_branch(connection, branch_id)?;

    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO branch_fund_addition
            (branch_id, added_by, amount_htg, amount_usd, notes, is_allocated, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        (
            branch_id,
            add_funds.added_by,
            add_funds.amount_htg,
            add_funds.amount_usd,
            &add_funds.notes,
            created_at,
        ),
    )?;

    tracing::info!(
        "Funds added to branch {branch_id}: {} HTG, {} USD",
        add_funds.amount_htg,
        add_funds.amount_usd
    );

    Ok(BranchFundAddition {
        id: connection.last_insert_rowid(),
        branch_id,
        added_by: add_funds.added_by,
        amount_htg: add_funds.amount_htg,
        amount_usd: add_funds.amount_usd,
        notes: add_funds.notes.clone(),
        is_allocated: false,
        created_at,
    })
}
