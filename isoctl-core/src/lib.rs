//! Two-session demonstrations of SQL transaction isolation levels.
//!
//! Two sessions are opened against the same `accounts` table and driven
//! through a fixed interleaving of reads, writes, commits and rollbacks. The
//! balances each session sees along the way show which read anomalies the
//! chosen isolation level permits.

pub mod config;
pub mod error;
pub mod factory;
pub mod isolation;
pub mod memory;
pub mod mysql;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;

pub use config::DbConfig;
pub use error::{DemoError, Result};
pub use factory::{open_session, Connector};
pub use isolation::IsolationLevel;
pub use memory::{MemoryConnector, MemoryStore};
pub use mysql::MySqlConnector;
pub use report::{Observation, RecordingReporter, Reporter, StdoutReporter};
pub use runner::{Outcome, RunReport, Runner, SessionPair};
pub use scenario::{Anomaly, Scenario, SessionSlot, Step, Verdict, VerdictOutcome};
pub use session::{Balance, Session, SessionState, SENTINEL_BALANCE};
