//! The generic teller transaction ledger, the busiest of the ledger tables.

use axum::{Json, extract::State, http::StatusCode};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    branch::BranchId,
    currency::Currency,
    db::{CreateTable, MapRow},
    user::UserId,
};

use super::{TransactionStatus, TransactionType};

/// A generic teller transaction: a cash deposit or withdrawal at a branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerTransaction {
    /// The ID of the transaction.
    pub id: i64,
    /// The branch the cash moved through.
    pub branch_id: BranchId,
    /// The teller who recorded the transaction.
    pub user_id: UserId,
    /// The cash session the transaction was recorded under, if any.
    pub cash_session_id: Option<i64>,
    /// The currency of the amount.
    pub currency: Currency,
    /// The amount of cash that moved.
    pub amount: f64,
    /// Whether cash moved in or out.
    pub txn_type: TransactionType,
    /// The lifecycle state of the row.
    pub status: TransactionStatus,
    /// A free-form description, e.g. "Dépôt espèces".
    pub description: Option<String>,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to record a generic teller transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    /// The branch the cash moved through.
    pub branch_id: BranchId,
    /// The teller who recorded the transaction.
    pub user_id: UserId,
    /// The cash session the transaction was recorded under, if any.
    pub cash_session_id: Option<i64>,
    /// The currency of the amount.
    pub currency: Currency,
    /// The amount of cash that moved. Must be positive.
    pub amount: f64,
    /// Whether cash moved in or out.
    pub txn_type: TransactionType,
    /// The lifecycle state of the row; settled immediately when omitted.
    #[serde(default)]
    pub status: TransactionStatus,
    /// A free-form description.
    pub description: Option<String>,
}

impl CreateTable for LedgerTransaction {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        connection.execute(
            "CREATE TABLE \"transaction\" (
                id INTEGER PRIMARY KEY,
                branch_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                cash_session_id INTEGER,
                currency TEXT NOT NULL,
                amount REAL NOT NULL,
                txn_type TEXT NOT NULL,
                status TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(branch_id) REFERENCES branch(id),
                FOREIGN KEY(user_id) REFERENCES user(id),
                FOREIGN KEY(cash_session_id) REFERENCES cash_session(id)
                )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for LedgerTransaction {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            branch_id: row.get(offset + 1)?,
            user_id: row.get(offset + 2)?,
            cash_session_id: row.get(offset + 3)?,
            currency: row.get(offset + 4)?,
            amount: row.get(offset + 5)?,
            txn_type: row.get(offset + 6)?,
            status: row.get(offset + 7)?,
            description: row.get(offset + 8)?,
            created_at: row.get(offset + 9)?,
        })
    }
}

/// Insert a new teller transaction into the ledger.
///
/// # Errors
/// Returns [Error::NonPositiveAmount] for a zero or negative amount, and
/// [Error::InvalidForeignKey] if the branch, user or session does not exist.
pub fn record_transaction(
    connection: &Connection,
    new_transaction: &NewTransaction,
) -> Result<LedgerTransaction, Error> {
    if new_transaction.amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }

    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO \"transaction\"
            (branch_id, user_id, cash_session_id, currency, amount, txn_type, status, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        (
            new_transaction.branch_id,
            new_transaction.user_id,
            new_transaction.cash_session_id,
            new_transaction.currency,
            new_transaction.amount,
            new_transaction.txn_type,
            new_transaction.status,
            &new_transaction.description,
            created_at,
        ),
    )?;

    Ok(LedgerTransaction {
        id: connection.last_insert_rowid(),
        branch_id: new_transaction.branch_id,
        user_id: new_transaction.user_id,
        cash_session_id: new_transaction.cash_session_id,
        currency: new_transaction.currency,
        amount: new_transaction.amount,
        txn_type: new_transaction.txn_type,
        status: new_transaction.status,
        description: new_transaction.description.clone(),
        created_at,
    })
}

/// A route handler for recording a generic teller transaction.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<(StatusCode, Json<LedgerTransaction>), Error> {
    let connection = state.connection()?;
    let transaction = record_transaction(&connection, &new_transaction)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[cfg(test)]
mod transaction_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        branch::{NewBranch, create_branch},
        currency::Currency,
        db::initialize,
        ledger::{TransactionStatus, TransactionType},
        user::{NewUser, Role, create_user},
    };

    use super::{NewTransaction, record_transaction};

    fn init_db_with_branch_and_teller() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let branch = create_branch(
            &conn,
            &NewBranch {
                name: "Succursale Delmas".to_owned(),
                code: "DEL".to_owned(),
                primary_currency: Currency::HTG,
            },
        )
        .unwrap();
        let teller = create_user(
            &conn,
            &NewUser {
                first_name: "Marie".to_owned(),
                last_name: "Joseph".to_owned(),
                role: Role::Cashier,
                branch_id: branch.id,
            },
        )
        .unwrap();

        (conn, branch.id, teller.id)
    }

    fn deposit(branch_id: i64, user_id: i64, amount: f64) -> NewTransaction {
        NewTransaction {
            branch_id,
            user_id,
            cash_session_id: None,
            currency: Currency::HTG,
            amount,
            txn_type: TransactionType::Deposit,
            status: TransactionStatus::Completed,
            description: Some("Dépôt espèces".to_owned()),
        }
    }

    #[test]
    fn record_transaction_succeeds() {
        let (conn, branch_id, teller_id) = init_db_with_branch_and_teller();

        let transaction =
            record_transaction(&conn, &deposit(branch_id, teller_id, 5_000.0)).unwrap();

        assert!(transaction.id > 0);
        assert_eq!(transaction.amount, 5_000.0);
        assert_eq!(transaction.status, TransactionStatus::Completed);
    }

    #[test]
    fn record_transaction_fails_on_non_positive_amount() {
        let (conn, branch_id, teller_id) = init_db_with_branch_and_teller();

        for amount in [0.0, -25.0] {
            let result = record_transaction(&conn, &deposit(branch_id, teller_id, amount));

            assert_eq!(result, Err(Error::NonPositiveAmount));
        }
    }

    #[test]
    fn record_transaction_fails_on_invalid_branch() {
        let (conn, branch_id, teller_id) = init_db_with_branch_and_teller();

        let result = record_transaction(&conn, &deposit(branch_id + 1, teller_id, 100.0));

        assert_eq!(result, Err(Error::InvalidForeignKey));
    }
}
