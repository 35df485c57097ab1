//! The open and close workflows for cash sessions.

use rusqlite::{Connection, OptionalExtension, Transaction as SqlTransaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    balance::branch_balance,
    branch::BranchId,
    currency::Currency,
    db::MapRow,
    user::{Role, User, UserId, get_user},
};

use super::{CashSession, SELECT_SESSION, SessionStatus, get_session};

/// The request body for opening a session on a cashier's behalf.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionForCashier {
    /// The cashier who will work the drawer.
    pub cashier_id: UserId,
    /// The manager authorizing the opening float.
    pub manager_id: UserId,
    /// The gourdes handed over.
    #[serde(default)]
    pub opening_htg: f64,
    /// The dollars handed over.
    #[serde(default)]
    pub opening_usd: f64,
    /// Optional note from the manager.
    pub notes: Option<String>,
}

/// The request body for closing a session.
#[derive(Debug, Clone, Deserialize)]
pub struct CloseSession {
    /// The manager counting the drawer back in.
    pub manager_id: UserId,
    /// The gourdes counted.
    #[serde(default)]
    pub closing_htg: f64,
    /// The dollars counted.
    #[serde(default)]
    pub closing_usd: f64,
    /// Optional note from the manager.
    pub notes: Option<String>,
}

/// The outcome of closing a session.
///
/// The variance is the counted cash minus the opening float. A variance is
/// reported but never blocks the close; chasing it down is a back-office
/// matter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCloseSummary {
    /// The closed session.
    pub session: CashSession,
    /// Counted minus expected gourdes.
    pub variance_htg: f64,
    /// Counted minus expected dollars.
    pub variance_usd: f64,
}

fn open_session_for(transaction: &Connection, cashier: &User) -> Result<Option<i64>, Error> {
    let session_id = transaction
        .query_row(
            "SELECT id FROM cash_session WHERE user_id = :user_id AND status = 'Open'",
            &[(":user_id", &cashier.id)],
            |row| row.get(0),
        )
        .optional()?;

    Ok(session_id)
}

/// Open a cash session for a cashier with an opening float.
///
/// The eligibility checks, the balance check and the session insert all run
/// in one SQL transaction, so two concurrent openings cannot both pass the
/// same availability check.
///
/// # Errors
/// Returns [Error::CashierNotFound] for an unknown cashier,
/// [Error::NotACashier] if the user is not a cashier,
/// [Error::InactiveCashier] if the cashier is deactivated,
/// [Error::SessionAlreadyOpen] if the cashier already has an open session,
/// [Error::NegativeAmount] for a negative float, and
/// [Error::InsufficientFunds] if either float exceeds the branch's available
/// cash in that currency.
pub fn open_session(
    connection: &Connection,
    request: &OpenSessionForCashier,
) -> Result<CashSession, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let cashier = get_user(&transaction, request.cashier_id).map_err(|error| match error {
        Error::UserNotFound => Error::CashierNotFound,
        error => error,
    })?;

    if cashier.role != Role::Cashier {
        return Err(Error::NotACashier);
    }
    if !cashier.is_active {
        return Err(Error::InactiveCashier);
    }
    if open_session_for(&transaction, &cashier)?.is_some() {
        return Err(Error::SessionAlreadyOpen);
    }
    if request.opening_htg < 0.0 || request.opening_usd < 0.0 {
        return Err(Error::NegativeAmount);
    }

    let balance = branch_balance(&transaction, cashier.branch_id)?;
    for (currency, requested) in [
        (Currency::HTG, request.opening_htg),
        (Currency::USD, request.opening_usd),
    ] {
        let available = balance.available(currency);
        if requested > available {
            return Err(Error::InsufficientFunds {
                currency,
                requested,
                available,
            });
        }
    }

    let session_start = OffsetDateTime::now_utc();
    let mut notes = format!("Ouvert par manager: {}", request.manager_id);
    if let Some(extra) = &request.notes {
        notes.push_str(". ");
        notes.push_str(extra);
    }

    transaction.execute(
        "INSERT INTO cash_session
            (user_id, branch_id, opening_htg, opening_usd, status, session_start, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            cashier.id,
            cashier.branch_id,
            request.opening_htg,
            request.opening_usd,
            SessionStatus::Open,
            session_start,
            &notes,
        ),
    )?;
    let id = transaction.last_insert_rowid();

    transaction.commit()?;

    tracing::info!(
        "Session {id} opened for cashier {} at branch {} ({} HTG / {} USD)",
        cashier.id,
        cashier.branch_id,
        request.opening_htg,
        request.opening_usd
    );

    Ok(CashSession {
        id,
        user_id: cashier.id,
        branch_id: cashier.branch_id,
        opening_htg: request.opening_htg,
        opening_usd: request.opening_usd,
        closing_htg: None,
        closing_usd: None,
        status: SessionStatus::Open,
        session_start,
        session_end: None,
        notes,
    })
}

/// Close a cash session and report the drawer variance.
///
/// # Errors
/// Returns [Error::SessionNotFound] for an unknown session,
/// [Error::SessionNotOpen] if the session is already closed, and
/// [Error::NegativeAmount] for a negative counted amount.
pub fn close_session(
    connection: &Connection,
    session_id: i64,
    request: &CloseSession,
) -> Result<SessionCloseSummary, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Deferred)?;

    let session = get_session(&transaction, session_id)?;

    if session.status != SessionStatus::Open {
        return Err(Error::SessionNotOpen);
    }
    if request.closing_htg < 0.0 || request.closing_usd < 0.0 {
        return Err(Error::NegativeAmount);
    }

    let session_end = OffsetDateTime::now_utc();
    let mut notes = format!(
        "{} | Fermé par manager: {}",
        session.notes, request.manager_id
    );
    if let Some(extra) = &request.notes {
        notes.push_str(". ");
        notes.push_str(extra);
    }

    transaction.execute(
        "UPDATE cash_session
            SET closing_htg = ?1, closing_usd = ?2, status = ?3, session_end = ?4, notes = ?5
            WHERE id = ?6",
        (
            request.closing_htg,
            request.closing_usd,
            SessionStatus::Closed,
            session_end,
            &notes,
            session_id,
        ),
    )?;

    transaction.commit()?;

    let variance_htg = request.closing_htg - session.opening_htg;
    let variance_usd = request.closing_usd - session.opening_usd;

    if variance_htg != 0.0 || variance_usd != 0.0 {
        tracing::warn!(
            "Session {session_id} closed with variance: {variance_htg} HTG / {variance_usd} USD"
        );
    } else {
        tracing::info!("Session {session_id} closed with a balanced drawer");
    }

    Ok(SessionCloseSummary {
        session: CashSession {
            closing_htg: Some(request.closing_htg),
            closing_usd: Some(request.closing_usd),
            status: SessionStatus::Closed,
            session_end: Some(session_end),
            notes,
            ..session
        },
        variance_htg,
        variance_usd,
    })
}

/// List the sessions of a branch, most recent first, optionally filtered by
/// status.
pub fn list_branch_sessions(
    connection: &Connection,
    branch_id: BranchId,
    status: Option<SessionStatus>,
) -> Result<Vec<CashSession>, Error> {
    let sessions = match status {
        Some(status) => connection
            .prepare(&format!(
                "{SELECT_SESSION} WHERE branch_id = :branch_id AND status = :status
                    ORDER BY id DESC"
            ))?
            .query_map(
                &[
                    (":branch_id", &branch_id as &dyn rusqlite::ToSql),
                    (":status", &status),
                ],
                CashSession::map_row,
            )?
            .collect::<Result<Vec<_>, _>>()?,
        None => connection
            .prepare(&format!(
                "{SELECT_SESSION} WHERE branch_id = :branch_id ORDER BY id DESC"
            ))?
            .query_map(&[(":branch_id", &branch_id)], CashSession::map_row)?
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(sessions)
}

/// List the active cashiers of a branch who do not have an open session.
pub fn available_cashiers(connection: &Connection, branch_id: BranchId) -> Result<Vec<User>, Error> {
    let cashiers = connection
        .prepare(
            "SELECT id, first_name, last_name, role, branch_id, is_active FROM user
                WHERE branch_id = :branch_id AND role = 'Cashier' AND is_active = 1
                AND id NOT IN (SELECT user_id FROM cash_session WHERE status = 'Open')
                ORDER BY last_name, first_name",
        )?
        .query_map(&[(":branch_id", &branch_id)], User::map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cashiers)
}

#[cfg(test)]
mod cash_session_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        balance::branch_balance,
        branch::{NewBranch, create_branch},
        currency::Currency,
        db::initialize,
        ledger::{AddFunds, add_branch_funds},
        user::{NewUser, Role, create_user, set_user_active},
    };

    use super::{
        CloseSession, OpenSessionForCashier, SessionStatus, available_cashiers, close_session,
        open_session,
    };

    struct Fixture {
        conn: Connection,
        branch_id: i64,
        cashier_id: i64,
        manager_id: i64,
    }

    /// A branch funded with 50 000 HTG and 200 USD, one cashier, one manager.
    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let branch = create_branch(
            &conn,
            &NewBranch {
                name: "Succursale Cap-Haïtien".to_owned(),
                code: "CAP".to_owned(),
                primary_currency: Currency::HTG,
            },
        )
        .unwrap();
        let cashier = create_user(
            &conn,
            &NewUser {
                first_name: "Fabiola".to_owned(),
                last_name: "Désir".to_owned(),
                role: Role::Cashier,
                branch_id: branch.id,
            },
        )
        .unwrap();
        let manager = create_user(
            &conn,
            &NewUser {
                first_name: "Patrick".to_owned(),
                last_name: "Louis".to_owned(),
                role: Role::Manager,
                branch_id: branch.id,
            },
        )
        .unwrap();

        add_branch_funds(
            &conn,
            branch.id,
            &AddFunds {
                added_by: manager.id,
                amount_htg: 50_000.0,
                amount_usd: 200.0,
                notes: None,
            },
        )
        .unwrap();

        Fixture {
            conn,
            branch_id: branch.id,
            cashier_id: cashier.id,
            manager_id: manager.id,
        }
    }

    fn open_request(fixture: &Fixture, htg: f64, usd: f64) -> OpenSessionForCashier {
        OpenSessionForCashier {
            cashier_id: fixture.cashier_id,
            manager_id: fixture.manager_id,
            opening_htg: htg,
            opening_usd: usd,
            notes: None,
        }
    }

    #[test]
    fn open_session_allocates_branch_cash() {
        let fixture = fixture();

        let session = open_session(&fixture.conn, &open_request(&fixture, 20_000.0, 50.0)).unwrap();

        assert_eq!(session.status, SessionStatus::Open);
        assert!(session.notes.contains(&format!(
            "Ouvert par manager: {}",
            fixture.manager_id
        )));

        let balance = branch_balance(&fixture.conn, fixture.branch_id).unwrap();
        assert_eq!(balance.total_htg, 50_000.0);
        assert_eq!(balance.allocated_htg, 20_000.0);
        assert_eq!(balance.available_htg, 30_000.0);
        assert_eq!(balance.available_usd, 150.0);
    }

    #[test]
    fn open_session_rejects_float_exceeding_available_cash() {
        let fixture = fixture();

        let result = open_session(&fixture.conn, &open_request(&fixture, 50_000.01, 0.0));

        assert_eq!(
            result,
            Err(Error::InsufficientFunds {
                currency: Currency::HTG,
                requested: 50_000.01,
                available: 50_000.0,
            })
        );

        let session_count: i64 = fixture
            .conn
            .query_row("SELECT COUNT(*) FROM cash_session", [], |row| row.get(0))
            .unwrap();
        assert_eq!(session_count, 0);
    }

    #[test]
    fn open_session_allows_float_equal_to_available_cash() {
        let fixture = fixture();

        let session = open_session(&fixture.conn, &open_request(&fixture, 50_000.0, 200.0)).unwrap();
        assert_eq!(session.status, SessionStatus::Open);

        let balance = branch_balance(&fixture.conn, fixture.branch_id).unwrap();
        assert_eq!(balance.available_htg, 0.0);
        assert_eq!(balance.available_usd, 0.0);

        let second_cashier = create_user(
            &fixture.conn,
            &NewUser {
                first_name: "Jean".to_owned(),
                last_name: "Baptiste".to_owned(),
                role: Role::Cashier,
                branch_id: fixture.branch_id,
            },
        )
        .unwrap();
        let result = open_session(
            &fixture.conn,
            &OpenSessionForCashier {
                cashier_id: second_cashier.id,
                ..open_request(&fixture, 1.0, 0.0)
            },
        );

        assert_eq!(
            result,
            Err(Error::InsufficientFunds {
                currency: Currency::HTG,
                requested: 1.0,
                available: 0.0,
            })
        );
    }

    #[test]
    fn cashier_cannot_have_two_open_sessions() {
        let fixture = fixture();

        open_session(&fixture.conn, &open_request(&fixture, 1_000.0, 0.0)).unwrap();
        let result = open_session(&fixture.conn, &open_request(&fixture, 1_000.0, 0.0));

        assert_eq!(result, Err(Error::SessionAlreadyOpen));

        let open_count: i64 = fixture
            .conn
            .query_row(
                "SELECT COUNT(*) FROM cash_session WHERE user_id = :user_id AND status = 'Open'",
                &[(":user_id", &fixture.cashier_id)],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(open_count, 1);
    }

    #[test]
    fn only_active_cashiers_can_open_sessions() {
        let fixture = fixture();

        let manager_request = OpenSessionForCashier {
            cashier_id: fixture.manager_id,
            ..open_request(&fixture, 0.0, 0.0)
        };
        assert_eq!(
            open_session(&fixture.conn, &manager_request),
            Err(Error::NotACashier)
        );

        set_user_active(&fixture.conn, fixture.cashier_id, false).unwrap();
        assert_eq!(
            open_session(&fixture.conn, &open_request(&fixture, 0.0, 0.0)),
            Err(Error::InactiveCashier)
        );
    }

    #[test]
    fn close_session_releases_cash_and_reports_variance() {
        let fixture = fixture();

        let session = open_session(&fixture.conn, &open_request(&fixture, 20_000.0, 50.0)).unwrap();

        let summary = close_session(
            &fixture.conn,
            session.id,
            &CloseSession {
                manager_id: fixture.manager_id,
                closing_htg: 19_750.0,
                closing_usd: 50.0,
                notes: Some("Manque constaté".to_owned()),
            },
        )
        .unwrap();

        assert_eq!(summary.variance_htg, -250.0);
        assert_eq!(summary.variance_usd, 0.0);
        assert_eq!(summary.session.status, SessionStatus::Closed);
        assert!(summary.session.notes.contains(&format!(
            "Fermé par manager: {}",
            fixture.manager_id
        )));

        // Closed sessions no longer hold an allocation.
        let balance = branch_balance(&fixture.conn, fixture.branch_id).unwrap();
        assert_eq!(balance.allocated_htg, 0.0);
        assert_eq!(balance.available_htg, 50_000.0);
    }

    #[test]
    fn closed_session_cannot_be_closed_again() {
        let fixture = fixture();

        let session = open_session(&fixture.conn, &open_request(&fixture, 1_000.0, 0.0)).unwrap();
        let close = CloseSession {
            manager_id: fixture.manager_id,
            closing_htg: 1_000.0,
            closing_usd: 0.0,
            notes: None,
        };

        close_session(&fixture.conn, session.id, &close).unwrap();
        let result = close_session(&fixture.conn, session.id, &close);

        assert_eq!(result, Err(Error::SessionNotOpen));
    }

    #[test]
    fn available_cashiers_excludes_busy_and_inactive() {
        let fixture = fixture();

        let second_cashier = create_user(
            &fixture.conn,
            &NewUser {
                first_name: "Kettly".to_owned(),
                last_name: "Augustin".to_owned(),
                role: Role::Cashier,
                branch_id: fixture.branch_id,
            },
        )
        .unwrap();

        open_session(&fixture.conn, &open_request(&fixture, 1_000.0, 0.0)).unwrap();

        let available = available_cashiers(&fixture.conn, fixture.branch_id).unwrap();
        assert_eq!(
            available.iter().map(|user| user.id).collect::<Vec<_>>(),
            vec![second_cashier.id]
        );

        set_user_active(&fixture.conn, second_cashier.id, false).unwrap();
        assert!(
            available_cashiers(&fixture.conn, fixture.branch_id)
                .unwrap()
                .is_empty()
        );
    }
}
