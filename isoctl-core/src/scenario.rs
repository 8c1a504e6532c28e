//! Demo scenarios expressed as data.
//!
//! A scenario is an isolation level plus an ordered list of steps over two
//! sessions. The runner walks the list front to back; there is no branching.

use std::fmt;

use crate::isolation::IsolationLevel;
use crate::report::Observation;
use crate::session::ACCOUNT;

/// Which of the two demo sessions a step runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSlot {
    First,
    Second,
}

impl SessionSlot {
    pub const BOTH: [SessionSlot; 2] = [SessionSlot::First, SessionSlot::Second];

    pub fn number(self) -> usize {
        match self {
            SessionSlot::First => 1,
            SessionSlot::Second => 2,
        }
    }

    pub fn index(self) -> usize {
        self.number() - 1
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionSlot::First => "session1",
            SessionSlot::Second => "session2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Start a transaction at the scenario's isolation level
    Begin(SessionSlot),
    /// `UPDATE accounts SET balance = 9999 WHERE name = 'Alice'`
    Update(SessionSlot),
    /// `SELECT balance ...`, recorded as an observation
    Read {
        session: SessionSlot,
        description: String,
    },
    Commit(SessionSlot),
    Rollback(SessionSlot),
}

impl Step {
    pub fn session(&self) -> SessionSlot {
        match self {
            Step::Begin(s) | Step::Update(s) | Step::Commit(s) | Step::Rollback(s) => *s,
            Step::Read { session, .. } => *session,
        }
    }

    fn read(session: SessionSlot, description: impl Into<String>) -> Self {
        Step::Read {
            session,
            description: description.into(),
        }
    }
}

/// The read phenomenon a scenario is built to expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    DirtyRead,
    NonRepeatableRead,
}

impl Anomaly {
    /// Whether `level` lets this anomaly through
    pub fn permitted_under(self, level: IsolationLevel) -> bool {
        match self {
            Anomaly::DirtyRead => level.allows_dirty_reads(),
            Anomaly::NonRepeatableRead => level.allows_non_repeatable_reads(),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DirtyRead => f.write_str("dirty read"),
            Anomaly::NonRepeatableRead => f.write_str("non-repeatable read"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub isolation: IsolationLevel,
    pub anomaly: Anomaly,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// session1 writes without committing, session2 reads, session1 rolls back.
    pub fn dirty_read(isolation: IsolationLevel) -> Self {
        use SessionSlot::{First, Second};

        Self {
            name: "dirty-read".to_string(),
            isolation,
            anomaly: Anomaly::DirtyRead,
            steps: vec![
                Step::Begin(First),
                Step::Update(First),
                Step::Begin(Second),
                Step::read(
                    Second,
                    format!("Dirty Read ({}): {}'s balance", isolation, ACCOUNT),
                ),
                Step::Rollback(First),
                Step::Commit(Second),
                Step::read(Second, format!("{}'s balance after rollback", ACCOUNT)),
            ],
        }
    }

    /// session1 reads, session2 updates and commits, session1 reads again.
    pub fn non_repeatable_read(isolation: IsolationLevel) -> Self {
        use SessionSlot::{First, Second};

        Self {
            name: "non-repeatable-read".to_string(),
            isolation,
            anomaly: Anomaly::NonRepeatableRead,
            steps: vec![
                Step::Begin(First),
                Step::read(First, format!("{}'s balance", ACCOUNT)),
                Step::Begin(Second),
                Step::Update(Second),
                Step::read(First, format!("({}): {}'s balance", isolation, ACCOUNT)),
                Step::Commit(Second),
                Step::read(
                    First,
                    format!("Non-Repeatable read ({}): {}'s balance", isolation, ACCOUNT),
                ),
            ],
        }
    }

    /// The two demos in their classic configuration
    pub fn defaults() -> Vec<Scenario> {
        vec![
            Scenario::dirty_read(IsolationLevel::ReadUncommitted),
            Scenario::non_repeatable_read(IsolationLevel::ReadCommitted),
        ]
    }

    pub fn reads(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Read { .. }))
            .count()
    }

    /// Judge the observations of a run of this scenario.
    ///
    /// Both anomalies come down to the first and last read disagreeing: the
    /// dirty value versus the rolled-back one, or the baseline versus the
    /// post-commit re-read.
    pub fn verdict(&self, observations: &[Observation]) -> Verdict {
        let outcome = if observations.len() < self.reads() {
            VerdictOutcome::Inconclusive
        } else {
            match (observations.first(), observations.last()) {
                (Some(first), Some(last)) if first.balance != last.balance => {
                    VerdictOutcome::Observed
                }
                (Some(_), Some(_)) => VerdictOutcome::NotObserved,
                _ => VerdictOutcome::Inconclusive,
            }
        };

        Verdict {
            anomaly: self.anomaly,
            isolation: self.isolation,
            outcome,
            permitted: self.anomaly.permitted_under(self.isolation),
            balances: observations
                .iter()
                .map(|o| o.balance.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictOutcome {
    Observed,
    NotObserved,
    /// The run stopped before every read happened
    Inconclusive,
}

/// Whether a run actually exhibited its scenario's anomaly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub anomaly: Anomaly,
    pub isolation: IsolationLevel,
    pub outcome: VerdictOutcome,
    /// Whether the isolation level allows the anomaly at all
    pub permitted: bool,
    pub balances: Vec<String>,
}

impl Verdict {
    /// `None` when the run was inconclusive
    pub fn as_expected(&self) -> Option<bool> {
        match self.outcome {
            VerdictOutcome::Observed => Some(self.permitted),
            VerdictOutcome::NotObserved => Some(!self.permitted),
            VerdictOutcome::Inconclusive => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            VerdictOutcome::Observed => write!(
                f,
                "Verdict: {} observed under {}",
                self.anomaly, self.isolation
            )?,
            VerdictOutcome::NotObserved => write!(
                f,
                "Verdict: no {} under {}",
                self.anomaly, self.isolation
            )?,
            VerdictOutcome::Inconclusive => {
                return write!(f, "Verdict: inconclusive, the run did not complete")
            }
        }
        let note = match (self.outcome, self.permitted) {
            (VerdictOutcome::Observed, true) => "as the level permits",
            (VerdictOutcome::Observed, false) => "although the level forbids it",
            (_, true) => "although the level permits it",
            (_, false) => "as the level guarantees",
        };
        write!(f, ", {} (reads: {})", note, self.balances.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Balance;

    fn obs(value: f64) -> Observation {
        Observation::now("session1", "read", Balance(value))
    }

    #[test]
    fn dirty_read_interleaving() {
        let scenario = Scenario::dirty_read(IsolationLevel::ReadUncommitted);
        let sessions: Vec<usize> = scenario.steps.iter().map(|s| s.session().number()).collect();

        assert_eq!(sessions, vec![1, 1, 2, 2, 1, 2, 2]);
        assert_eq!(scenario.reads(), 2);
        assert_eq!(
            scenario.steps[3],
            Step::Read {
                session: SessionSlot::Second,
                description: "Dirty Read (READ UNCOMMITTED): Alice's balance".into(),
            }
        );
        assert_eq!(scenario.steps[4], Step::Rollback(SessionSlot::First));
    }

    #[test]
    fn non_repeatable_read_interleaving() {
        let scenario = Scenario::non_repeatable_read(IsolationLevel::ReadCommitted);
        let sessions: Vec<usize> = scenario.steps.iter().map(|s| s.session().number()).collect();

        assert_eq!(sessions, vec![1, 1, 2, 2, 1, 2, 1]);
        assert_eq!(scenario.reads(), 3);
        assert_eq!(scenario.steps[5], Step::Commit(SessionSlot::Second));
    }

    #[test]
    fn descriptions_follow_the_level() {
        let scenario = Scenario::non_repeatable_read(IsolationLevel::RepeatableRead);
        assert!(matches!(
            scenario.steps.last(),
            Some(Step::Read { description, .. })
                if description == "Non-Repeatable read (REPEATABLE READ): Alice's balance"
        ));
    }

    #[test]
    fn verdicts() {
        let scenario = Scenario::non_repeatable_read(IsolationLevel::ReadCommitted);

        let verdict = scenario.verdict(&[obs(1000.0), obs(1000.0), obs(9999.0)]);
        assert_eq!(verdict.outcome, VerdictOutcome::Observed);
        assert_eq!(
            verdict.to_string(),
            "Verdict: non-repeatable read observed under READ COMMITTED, as the level permits \
             (reads: 1000 -> 1000 -> 9999)"
        );
        assert_eq!(verdict.as_expected(), Some(true));

        let verdict = scenario.verdict(&[obs(1000.0), obs(1000.0), obs(1000.0)]);
        assert_eq!(verdict.outcome, VerdictOutcome::NotObserved);
        assert_eq!(verdict.as_expected(), Some(false));
        assert!(verdict
            .to_string()
            .starts_with("Verdict: no non-repeatable read under READ COMMITTED, although the level permits it"));

        let verdict = scenario.verdict(&[obs(1000.0)]);
        assert_eq!(verdict.outcome, VerdictOutcome::Inconclusive);
        assert_eq!(verdict.as_expected(), None);
    }

    #[test]
    fn verdict_checks_the_level_guarantees() {
        let scenario = Scenario::dirty_read(IsolationLevel::ReadCommitted);
        assert!(!scenario.verdict(&[]).permitted);

        let verdict = scenario.verdict(&[obs(1000.0), obs(1000.0)]);
        assert_eq!(verdict.as_expected(), Some(true));
        assert_eq!(
            verdict.to_string(),
            "Verdict: no dirty read under READ COMMITTED, as the level guarantees (reads: 1000 -> 1000)"
        );

        let verdict = scenario.verdict(&[obs(9999.0), obs(1000.0)]);
        assert_eq!(verdict.as_expected(), Some(false));
        assert!(verdict.to_string().contains("although the level forbids it"));
    }

    #[test]
    fn permitted_anomalies_per_level() {
        use IsolationLevel::*;

        let dirty: Vec<bool> = IsolationLevel::ALL
            .iter()
            .map(|l| Anomaly::DirtyRead.permitted_under(*l))
            .collect();
        assert_eq!(dirty, vec![true, false, false, false]);
        assert!(Anomaly::NonRepeatableRead.permitted_under(ReadCommitted));
        assert!(!Anomaly::NonRepeatableRead.permitted_under(RepeatableRead));
        assert!(!Anomaly::NonRepeatableRead.permitted_under(Serializable));
    }
}
