//! The customer account ledgers: savings, current and term savings accounts.
//!
//! The three products keep their own tables, as in the legacy schema, but
//! share one row shape and one recording path; [AccountKind] selects the
//! table.

use axum::{Json, extract::State, http::StatusCode};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error, branch::BranchId, currency::Currency, db::CreateTable, user::UserId,
};

use super::{TransactionStatus, TransactionType};

/// The customer account product a ledger row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// An ordinary passbook savings account.
    Savings,
    /// A chequing/current account.
    Current,
    /// A fixed-term savings account.
    TermSavings,
}

impl AccountKind {
    /// Every account ledger table, in schema order.
    pub const ALL: [AccountKind; 3] = [
        AccountKind::Savings,
        AccountKind::Current,
        AccountKind::TermSavings,
    ];

    /// The table the product's rows are stored in.
    pub fn table(&self) -> &'static str {
        match self {
            AccountKind::Savings => "savings_transaction",
            AccountKind::Current => "current_account_transaction",
            AccountKind::TermSavings => "term_savings_transaction",
        }
    }
}

/// A deposit or withdrawal against a customer account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountTransaction {
    /// The ID of the row within its product's table.
    pub id: i64,
    /// The product the row belongs to.
    pub kind: AccountKind,
    /// The branch the cash moved through.
    pub branch_id: BranchId,
    /// The teller who recorded the transaction.
    pub user_id: UserId,
    /// The customer's account number.
    pub account_number: String,
    /// The currency of the amount.
    pub currency: Currency,
    /// The amount of cash that moved.
    pub amount: f64,
    /// Whether cash moved in or out.
    pub txn_type: TransactionType,
    /// The lifecycle state of the row.
    pub status: TransactionStatus,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to record a customer account transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccountTransaction {
    /// The product the row belongs to.
    pub kind: AccountKind,
    /// The branch the cash moved through.
    pub branch_id: BranchId,
    /// The teller who recorded the transaction.
    pub user_id: UserId,
    /// The customer's account number.
    pub account_number: String,
    /// The currency of the amount.
    pub currency: Currency,
    /// The amount of cash that moved. Must be positive.
    pub amount: f64,
    /// Whether cash moved in or out.
    pub txn_type: TransactionType,
    /// The lifecycle state of the row; settled immediately when omitted.
    #[serde(default)]
    pub status: TransactionStatus,
}

impl CreateTable for AccountTransaction {
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error> {
        for kind in AccountKind::ALL {
            connection.execute(
                &format!(
                    "CREATE TABLE {} (
                        id INTEGER PRIMARY KEY,
                        branch_id INTEGER NOT NULL,
                        user_id INTEGER NOT NULL,
                        account_number TEXT NOT NULL,
                        currency TEXT NOT NULL,
                        amount REAL NOT NULL,
                        txn_type TEXT NOT NULL,
                        status TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        FOREIGN KEY(branch_id) REFERENCES branch(id),
                        FOREIGN KEY(user_id) REFERENCES user(id)
                        )",
                    kind.table()
                ),
                (),
            )?;
        }

        Ok(())
    }
}

fn map_account_row(kind: AccountKind) -> impl Fn(&Row) -> Result<AccountTransaction, rusqlite::Error>
{
    move |row| {
        Ok(AccountTransaction {
            id: row.get(0)?,
            kind,
            branch_id: row.get(1)?,
            user_id: row.get(2)?,
            account_number: row.get(3)?,
            currency: row.get(4)?,
            amount: row.get(5)?,
            txn_type: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Insert a new customer account transaction into its product's ledger.
///
/// # Errors
/// Returns [Error::NonPositiveAmount] for a zero or negative amount, and
/// [Error::InvalidForeignKey] if the branch or user does not exist.
pub fn record_account_transaction(
    connection: &Connection,
    new_transaction: &NewAccountTransaction,
) -> Result<AccountTransaction, Error> {
    if new_transaction.amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }

    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        &format!(
            "INSERT INTO {}
                (branch_id, user_id, account_number, currency, amount, txn_type, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            new_transaction.kind.table()
        ),
        (
            new_transaction.branch_id,
            new_transaction.user_id,
            &new_transaction.account_number,
            new_transaction.currency,
            new_transaction.amount,
            new_transaction.txn_type,
            new_transaction.status,
            created_at,
        ),
    )?;

    Ok(AccountTransaction {
        id: connection.last_insert_rowid(),
        kind: new_transaction.kind,
        branch_id: new_transaction.branch_id,
        user_id: new_transaction.user_id,
        account_number: new_transaction.account_number.clone(),
        currency: new_transaction.currency,
        amount: new_transaction.amount,
        txn_type: new_transaction.txn_type,
        status: new_transaction.status,
        created_at,
    })
}

/// Retrieve every transaction recorded against `account_number` in the
/// product's ledger, most recent first.
pub fn get_account_transactions(
    connection: &Connection,
    kind: AccountKind,
    account_number: &str,
) -> Result<Vec<AccountTransaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT id, branch_id, user_id, account_number, currency, amount, txn_type, status, created_at
                FROM {} WHERE account_number = :account_number ORDER BY id DESC",
            kind.table()
        ))?
        .query_map(&[(":account_number", account_number)], map_account_row(kind))?
        .map(|maybe_row| maybe_row.map_err(Error::SqlError))
        .collect()
}

/// A route handler for recording a customer account transaction.
pub async fn create_account_transaction_endpoint(
    State(state): State<AppState>,
    Json(new_transaction): Json<NewAccountTransaction>,
) -> Result<(StatusCode, Json<AccountTransaction>), Error> {
    let connection = state.connection()?;
    let transaction = record_account_transaction(&connection, &new_transaction)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[cfg(test)]
mod account_transaction_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        branch::{NewBranch, create_branch},
        currency::Currency,
        db::initialize,
        ledger::{TransactionStatus, TransactionType},
        user::{NewUser, Role, create_user},
    };

    use super::{
        AccountKind, NewAccountTransaction, get_account_transactions, record_account_transaction,
    };

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

    fn account_deposit(kind: AccountKind, branch_id: i64, user_id: i64) -> NewAccountTransaction {
        NewAccountTransaction {
            kind,
            branch_id,
            user_id,
            account_number: "SAV-000123".to_owned(),
            currency: Currency::USD,
            amount: 250.0,
            txn_type: TransactionType::Deposit,
            status: TransactionStatus::Completed,
        }
    }

    #[test]
    fn each_product_records_into_its_own_table() {
        let (conn, branch_id, teller_id) = init_db_with_branch_and_teller();

        for kind in AccountKind::ALL {
            record_account_transaction(&conn, &account_deposit(kind, branch_id, teller_id))
                .unwrap();
        }

        for kind in AccountKind::ALL {
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {}", kind.table()),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "expected exactly one row in {}", kind.table());
        }
    }

    #[test]
    fn transactions_are_listed_most_recent_first() {
        let (conn, branch_id, teller_id) = init_db_with_branch_and_teller();

        let first = record_account_transaction(
            &conn,
            &account_deposit(AccountKind::Savings, branch_id, teller_id),
        )
        .unwrap();
        let second = record_account_transaction(
            &conn,
            &account_deposit(AccountKind::Savings, branch_id, teller_id),
        )
        .unwrap();

        let transactions =
            get_account_transactions(&conn, AccountKind::Savings, "SAV-000123").unwrap();

        assert_eq!(transactions, vec![second, first]);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let (conn, branch_id, teller_id) = init_db_with_branch_and_teller();

        let mut transaction = account_deposit(AccountKind::Current, branch_id, teller_id);
        transaction.amount = 0.0;

        let result = record_account_transaction(&conn, &transaction);

        assert_eq!(result, Err(Error::NonPositiveAmount));
    }
}
