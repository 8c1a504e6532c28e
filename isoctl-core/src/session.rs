//! The session abstraction the runner drives.
//!
//! A session is one open connection that runs at most one transaction at a
//! time. The runner only ever issues two statements against the `accounts`
//! table, so the trait exposes those two directly instead of free-form SQL.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{DemoError, Result};
use crate::isolation::IsolationLevel;

/// The one account every scenario touches
pub const ACCOUNT: &str = "Alice";

/// Value written by the uncommitted/committed update
pub const SENTINEL_BALANCE: Balance = Balance(9999.0);

pub const SELECT_BALANCE_SQL: &str = "SELECT balance FROM accounts WHERE name = 'Alice'";
pub const UPDATE_BALANCE_SQL: &str = "UPDATE accounts SET balance = 9999 WHERE name = 'Alice'";

/// Numeric account balance as reported by the database
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Balance(pub f64);

impl FromStr for Balance {
    type Err = DemoError;

    /// Parses the text form of INT, DECIMAL or DOUBLE columns.
    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Balance)
            .ok_or_else(|| DemoError::invalid_balance(s))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, autocommit mode
    Idle,
    /// Inside an explicit transaction
    InTransaction(IsolationLevel),
    Closed,
}

impl SessionState {
    pub fn is_open(self) -> bool {
        self != SessionState::Closed
    }

    pub fn in_transaction(self) -> bool {
        matches!(self, SessionState::InTransaction(_))
    }
}

/// One open connection to the accounts database
#[async_trait]
pub trait Session: Send {
    /// Human-readable name, e.g. `session1`
    fn label(&self) -> &str;

    fn state(&self) -> SessionState;

    /// Start a transaction at the given isolation level.
    async fn begin(&mut self, level: IsolationLevel) -> Result<()>;

    /// Run `SELECT balance FROM accounts WHERE name = 'Alice'` and return the
    /// single value.
    async fn fetch_balance(&mut self) -> Result<Balance>;

    /// Run `UPDATE accounts SET balance = 9999 WHERE name = 'Alice'`,
    /// returning the number of affected rows.
    async fn update_balance(&mut self) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Close the connection. Closing a closed session is a no-op.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_parses_driver_text() {
        assert_eq!("1000".parse::<Balance>().unwrap(), Balance(1000.0));
        assert_eq!("9999.00".parse::<Balance>().unwrap(), SENTINEL_BALANCE);
        assert_eq!(" 12.5 ".parse::<Balance>().unwrap(), Balance(12.5));
        assert!("NaN".parse::<Balance>().is_err());
        assert!("lots".parse::<Balance>().is_err());
    }

    #[test]
    fn whole_balances_print_without_fraction() {
        assert_eq!(SENTINEL_BALANCE.to_string(), "9999");
        assert_eq!(Balance(10.25).to_string(), "10.25");
    }

    #[test]
    fn state_helpers() {
        let tx = SessionState::InTransaction(IsolationLevel::ReadCommitted);
        assert!(tx.is_open());
        assert!(tx.in_transaction());
        assert!(!SessionState::Closed.is_open());
        assert!(!SessionState::Idle.in_transaction());
    }
}
