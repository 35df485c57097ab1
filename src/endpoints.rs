//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/users/{user_id}', use
//! [format_endpoint].

/// The route to create or list branches.
pub const BRANCHES: &str = "/api/branches";
/// The route to access a single branch.
pub const BRANCH: &str = "/api/branches/{branch_id}";
/// The route to get a branch's aggregated cash balance.
pub const BRANCH_BALANCE: &str = "/api/branches/{branch_id}/balance";

/// The route to create users.
pub const USERS: &str = "/api/users";
/// The route to access a single user.
pub const USER: &str = "/api/users/{user_id}";

/// The route to record a generic teller transaction.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to record a savings/current/term account transaction.
pub const ACCOUNT_TRANSACTIONS: &str = "/api/account-transactions";
/// The route to perform a currency exchange.
pub const EXCHANGES: &str = "/api/exchanges";
/// The route to register a microcredit loan.
pub const MICROCREDIT_LOANS: &str = "/api/microcredit/loans";
/// The route to fetch a single microcredit loan.
pub const MICROCREDIT_LOAN: &str = "/api/microcredit/loans/{loan_id}";
/// The route to record a microcredit loan payment.
pub const MICROCREDIT_PAYMENTS: &str = "/api/microcredit/payments";

/// The route for a manager to open a cash session for a cashier.
pub const OPEN_SESSION_FOR_CASHIER: &str = "/api/cashsession/open-for-cashier";
/// The route for a manager to close a cash session.
pub const CLOSE_SESSION_BY_MANAGER: &str = "/api/cashsession/{session_id}/close-by-manager";
/// The route to access a single cash session.
pub const CASH_SESSION: &str = "/api/cashsession/{session_id}";
/// The route to list a branch's cash sessions.
pub const BRANCH_CASH_SESSIONS: &str = "/api/cashsession/branch/{branch_id}";
/// The route for a SuperAdmin fund injection into a branch.
pub const ADD_BRANCH_FUNDS: &str = "/api/cashsession/branch/{branch_id}/add-funds";
/// The route to list a branch's cashiers and whether they have an open session.
pub const AVAILABLE_CASHIERS: &str = "/api/cashsession/available-cashiers/{branch_id}";

/// The route to create or list inter-branch transfers.
pub const TRANSFERS: &str = "/api/interbranchtransfer";
/// The route to access a single inter-branch transfer.
pub const TRANSFER: &str = "/api/interbranchtransfer/{transfer_id}";
/// The route to approve a pending transfer.
pub const APPROVE_TRANSFER: &str = "/api/interbranchtransfer/{transfer_id}/approve";
/// The route to reject a pending transfer.
pub const REJECT_TRANSFER: &str = "/api/interbranchtransfer/{transfer_id}/reject";
/// The route to mark an approved transfer as dispatched.
pub const PROCESS_TRANSFER: &str = "/api/interbranchtransfer/{transfer_id}/process";
/// The route to finalize a dispatched transfer.
pub const COMPLETE_TRANSFER: &str = "/api/interbranchtransfer/{transfer_id}/complete";
/// The route to cancel a transfer that has not reached a terminal state.
pub const CANCEL_TRANSFER: &str = "/api/interbranchtransfer/{transfer_id}/cancel";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace. For
/// example, in the endpoint path '/api/users/{user_id}', '{user_id}' is the
/// parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter. If no parameter is found in `endpoint_path`, the
/// function returns the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, ch) in endpoint_path.char_indices() {
        match ch {
            '{' => param_start = Some(i),
            '}' => {
                param_end = Some(i);
                break;
            }
            _ => {}
        }
    }

    match (param_start, param_end) {
        (Some(start), Some(end)) => {
            let mut result = endpoint_path[..start].to_owned();
            result.push_str(&id.to_string());
            result.push_str(&endpoint_path[end + 1..]);
            result
        }
        _ => endpoint_path.to_owned(),
    }
}

#[cfg(test)]
mod format_endpoint_tests {
    use super::{CASH_SESSION, CLOSE_SESSION_BY_MANAGER, TRANSACTIONS, format_endpoint};

    #[test]
    fn replaces_parameter_with_id() {
        assert_eq!(format_endpoint(CASH_SESSION, 42), "/api/cashsession/42");
    }

    #[test]
    fn replaces_parameter_in_the_middle_of_the_path() {
        assert_eq!(
            format_endpoint(CLOSE_SESSION_BY_MANAGER, 7),
            "/api/cashsession/7/close-by-manager"
        );
    }

    #[test]
    fn returns_path_unchanged_without_parameter() {
        assert_eq!(format_endpoint(TRANSACTIONS, 1), TRANSACTIONS);
    }
}
