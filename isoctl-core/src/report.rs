//! Line-oriented trace output.
//!
//! Every line is best-effort: a failed write to stdout is ignored rather
//! than aborting a demo halfway through its transactions.

use std::fmt;
use std::io::Write;

use chrono::{DateTime, Local};

use crate::session::Balance;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One balance read, captured the moment it happened
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Local>,
    pub session: String,
    pub action: String,
    pub balance: Balance,
}

impl Observation {
    pub fn now(session: impl Into<String>, action: impl Into<String>, balance: Balance) -> Self {
        Self {
            timestamp: Local::now(),
            session: session.into(),
            action: action.into(),
            balance,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} = {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.session,
            self.action,
            self.balance
        )
    }
}

/// Sink for the demo trace
pub trait Reporter {
    /// Emit one finished line.
    fn line(&mut self, line: &str);

    fn observation(&mut self, observation: &Observation) {
        self.line(&observation.to_string());
    }

    /// A transaction-control step, e.g. `Transaction 1 started: <timestamp>`
    fn step(&mut self, action: &str, at: DateTime<Local>) {
        self.line(&format!("{}: {}", action, at.format(TIMESTAMP_FORMAT)));
    }

    fn failure(&mut self, message: &str) {
        self.line(&format!("Error: {}", message));
    }
}

/// Writes the trace to standard output
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn line(&mut self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }
}

/// Keeps everything in memory; used by tests and callers that post-process
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub lines: Vec<String>,
    pub observations: Vec<Observation>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn observation(&mut self, observation: &Observation) {
        self.observations.push(observation.clone());
        self.line(&observation.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn observation_line_has_timestamp_label_and_balance() {
        let observation = Observation {
            timestamp: Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            session: "session2".into(),
            action: "Dirty Read (READ UNCOMMITTED): Alice's balance".into(),
            balance: Balance(9999.0),
        };

        assert_eq!(
            observation.to_string(),
            "[2024-03-01 09:30:00.000000] session2: Dirty Read (READ UNCOMMITTED): Alice's balance = 9999"
        );
    }

    #[test]
    fn default_hooks_format_steps_and_failures() {
        let mut reporter = RecordingReporter::new();
        let at = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();

        reporter.step("Transaction 1 started", at);
        reporter.failure("Lock wait timeout exceeded");

        assert_eq!(
            reporter.lines,
            vec![
                "Transaction 1 started: 2024-03-01 09:30:00.000000".to_string(),
                "Error: Lock wait timeout exceeded".to_string(),
            ]
        );
    }
}
