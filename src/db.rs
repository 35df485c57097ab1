//! Traits for mapping the domain models onto the application's SQLite
//! database, and the schema initialization routine.

use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    branch::Branch,
    cash_session::CashSession,
    ledger::{
        AccountTransaction, BranchFundAddition, ExchangeTransaction, LedgerTransaction,
        MicrocreditLoan, MicrocreditPayment,
    },
    transfer::InterBranchTransfer,
    user::User,
};

/// A trait for adding an object schema to the database.
pub trait CreateTable {
    /// Create the table(s) for the model.
    ///
    /// # Errors
    /// Returns an error if the table already exists or if there is an SQL
    /// error.
    fn create_table(connection: &Connection) -> Result<(), rusqlite::Error>;
}

/// A trait for mapping a `rusqlite::Row` to a concrete rust type.
pub trait MapRow {
    /// The type each row maps to.
    type ReturnType;

    /// Convert a row into a concrete type.
    ///
    /// **Note:** This function expects that the row object contains all the
    /// table columns in the order they were defined.
    fn map_row(row: &Row) -> Result<Self::ReturnType, rusqlite::Error> {
        Self::map_row_with_offset(row, 0)
    }

    /// Convert a row into a concrete type, reading from the column at
    /// `offset`.
    ///
    /// This is useful where tables have been joined and you want to construct
    /// two different types from the one query.
    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error>;
}

/// Create the application's tables.
///
/// Foreign key enforcement is switched on for the connection: every ledger
/// row must reference an existing branch.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    Branch::create_table(&transaction)?;
    User::create_table(&transaction)?;
    LedgerTransaction::create_table(&transaction)?;
    AccountTransaction::create_table(&transaction)?;
    ExchangeTransaction::create_table(&transaction)?;
    MicrocreditLoan::create_table(&transaction)?;
    MicrocreditPayment::create_table(&transaction)?;
    BranchFundAddition::create_table(&transaction)?;
    CashSession::create_table(&transaction)?;
    InterBranchTransfer::create_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        // branch, user, transaction, three account ledgers, exchange, loan,
        // payment, fund addition, cash session and transfer.
        assert_eq!(table_count, 12);
    }

    #[test]
    fn initialize_twice_fails() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        assert!(initialize(&conn).is_err());
    }
}
