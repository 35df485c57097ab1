//! Branch balance aggregation.
//!
//! A branch's position per currency is recomputed on demand from the ledger
//! tables rather than kept as a stored running total, so a crash between
//! writes can never leave a stale figure behind.

use axum::{
    Json,
    extract::{Path, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    branch::{BranchId, get_branch},
    currency::Currency,
};

/// The aggregated cash position of a branch, split by currency.
///
/// `allocated` is the cash currently out with open cash sessions; `available`
/// is what remains in the vault for new sessions and outgoing transfers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchBalance {
    /// The branch the figures belong to.
    pub branch_id: BranchId,
    /// Net gourdes across every ledger table.
    pub total_htg: f64,
    /// Net dollars across every ledger table.
    pub total_usd: f64,
    /// Gourdes handed out to open cash sessions.
    pub allocated_htg: f64,
    /// Dollars handed out to open cash sessions.
    pub allocated_usd: f64,
    /// Gourdes available in the vault.
    pub available_htg: f64,
    /// Dollars available in the vault.
    pub available_usd: f64,
}

impl BranchBalance {
    /// The vault cash available in `currency`.
    pub fn available(&self, currency: Currency) -> f64 {
        match currency {
            Currency::HTG => self.available_htg,
            Currency::USD => self.available_usd,
        }
    }
}

// Deposits count positive, withdrawals negative. Only Completed rows count.
const NET_FLOW_TABLES: [&str; 5] = [
    "\"transaction\"",
    "savings_transaction",
    "current_account_transaction",
    "term_savings_transaction",
    "exchange_transaction",
];

fn net_flow(
    connection: &Connection,
    table: &str,
    branch_id: BranchId,
    currency: Currency,
) -> Result<f64, Error> {
    let sum: Option<f64> = connection.query_row(
        &format!(
            "SELECT SUM(CASE WHEN txn_type = 'Deposit' THEN amount ELSE -amount END)
                FROM {table}
                WHERE branch_id = :branch_id AND currency = :currency AND status = 'Completed'"
        ),
        &[
            (":branch_id", &branch_id as &dyn rusqlite::ToSql),
            (":currency", &currency),
        ],
        |row| row.get(0),
    )?;

    Ok(sum.unwrap_or(0.0))
}

fn sum_or_zero(
    connection: &Connection,
    sql: &str,
    params: &[(&str, &dyn rusqlite::ToSql)],
) -> Result<f64, Error> {
    let sum: Option<f64> = connection.query_row(sql, params, |row| row.get(0))?;

    Ok(sum.unwrap_or(0.0))
}

fn total_for_currency(
    connection: &Connection,
    branch_id: BranchId,
    currency: Currency,
) -> Result<f64, Error> {
    let mut total = 0.0;

    for table in NET_FLOW_TABLES {
        total += net_flow(connection, table, branch_id, currency)?;
    }

    total += sum_or_zero(
        connection,
        "SELECT SUM(amount) FROM microcredit_payment
            WHERE branch_id = :branch_id AND currency = :currency AND status = 'Completed'",
        &[
            (":branch_id", &branch_id as &dyn rusqlite::ToSql),
            (":currency", &currency),
        ],
    )?;

    let fund_column = match currency {
        Currency::HTG => "amount_htg",
        Currency::USD => "amount_usd",
    };
    total += sum_or_zero(
        connection,
        &format!("SELECT SUM({fund_column}) FROM branch_fund_addition WHERE branch_id = :branch_id"),
        &[(":branch_id", &branch_id as &dyn rusqlite::ToSql)],
    )?;

    total += sum_or_zero(
        connection,
        "SELECT SUM(amount) FROM inter_branch_transfer
            WHERE to_branch_id = :branch_id AND currency = :currency AND status = 'Completed'",
        &[
            (":branch_id", &branch_id as &dyn rusqlite::ToSql),
            (":currency", &currency),
        ],
    )?;
    total -= sum_or_zero(
        connection,
        "SELECT SUM(amount) FROM inter_branch_transfer
            WHERE from_branch_id = :branch_id AND currency = :currency AND status = 'Completed'",
        &[
            (":branch_id", &branch_id as &dyn rusqlite::ToSql),
            (":currency", &currency),
        ],
    )?;

    Ok(total)
}

fn allocated_for_currency(
    connection: &Connection,
    branch_id: BranchId,
    currency: Currency,
) -> Result<f64, Error> {
    let opening_column = match currency {
        Currency::HTG => "opening_htg",
        Currency::USD => "opening_usd",
    };

    sum_or_zero(
        connection,
        &format!(
            "SELECT SUM({opening_column}) FROM cash_session
                WHERE branch_id = :branch_id AND status = 'Open'"
        ),
        &[(":branch_id", &branch_id as &dyn rusqlite::ToSql)],
    )
}

/// Compute the cash position of `branch_id` from the ledger tables.
///
/// # Errors
/// Returns [Error::BranchNotFound] if `branch_id` does not refer to a branch.
pub fn branch_balance(connection: &Connection, branch_id: BranchId) -> Result<BranchBalance, Error> {
    get_branch(connection, branch_id)?;

    let total_htg = total_for_currency(connection, branch_id, Currency::HTG)?;
    let total_usd = total_for_currency(connection, branch_id, Currency::USD)?;
    let allocated_htg = allocated_for_currency(connection, branch_id, Currency::HTG)?;
    let allocated_usd = allocated_for_currency(connection, branch_id, Currency::USD)?;

    Ok(BranchBalance {
        branch_id,
        total_htg,
        total_usd,
        allocated_htg,
        allocated_usd,
        available_htg: total_htg - allocated_htg,
        available_usd: total_usd - allocated_usd,
    })
}

/// A route handler for fetching a branch's aggregated balance.
pub async fn get_branch_balance_endpoint(
    State(state): State<AppState>,
    Path(branch_id): Path<BranchId>,
) -> Result<Json<BranchBalance>, Error> {
    let connection = state.connection()?;

    Ok(Json(branch_balance(&connection, branch_id)?))
}
