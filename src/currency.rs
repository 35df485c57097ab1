//! The unified currency type shared by every ledger table.
//!
//! The storage boundary uses the text codes `HTG`/`USD`, so legacy data can
//! be read without a per-table discriminator.

use std::fmt::{self, Display};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// The two currencies handled by the branch network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Haitian gourde.
    HTG,
    /// US dollar.
    USD,
}

impl Currency {
    /// The currency code as stored in the database.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::HTG => "HTG",
            Currency::USD => "USD",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ToSql for Currency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Currency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "HTG" => Ok(Currency::HTG),
            "USD" => Ok(Currency::USD),
            other => Err(FromSqlError::Other(
                format!("unknown currency code \"{other}\"").into(),
            )),
        }
    }
}

#[cfg(test)]
mod currency_tests {
    use rusqlite::Connection;

    use super::Currency;

    #[test]
    fn currency_round_trips_through_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (currency TEXT NOT NULL)", ())
            .unwrap();

        for currency in [Currency::HTG, Currency::USD] {
            conn.execute("INSERT INTO t (currency) VALUES (?1)", (currency,))
                .unwrap();
        }

        let read_back: Vec<Currency> = conn
            .prepare("SELECT currency FROM t ORDER BY rowid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(read_back, vec![Currency::HTG, Currency::USD]);
    }

    #[test]
    fn unknown_code_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (currency TEXT NOT NULL)", ())
            .unwrap();
        conn.execute("INSERT INTO t (currency) VALUES ('EUR')", ())
            .unwrap();

        let result: Result<Currency, _> =
            conn.query_row("SELECT currency FROM t", [], |row| row.get(0));

        assert!(result.is_err());
    }
}
