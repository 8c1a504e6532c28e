//! Drives two sessions through a scenario's steps.
//!
//! Shape of one run:
//!
//! 1. open both sessions; if either fails, report and stop before any SQL
//! 2. walk the steps; the first error aborts the rest
//! 3. clean up: roll back open transactions, close every opened session
//!
//! Step 3 runs whatever step 2 returned.

use chrono::Local;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{DemoError, Result};
use crate::factory::{open_session, Connector};
use crate::report::{Observation, Reporter};
use crate::scenario::{Scenario, SessionSlot, Step, Verdict};
use crate::session::{Session, SENTINEL_BALANCE};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// A step failed; carries the driver's message
    Aborted(String),
    /// At least one session could not be opened; no SQL ran
    ConnectFailed,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario: String,
    pub observations: Vec<Observation>,
    pub outcome: Outcome,
    pub verdict: Verdict,
}

impl RunReport {
    pub fn completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

/// The two sessions of one run. Slots are `None` until opened and after close.
#[derive(Default)]
pub struct SessionPair {
    slots: [Option<Box<dyn Session>>; 2],
}

impl SessionPair {
    pub fn new(first: Option<Box<dyn Session>>, second: Option<Box<dyn Session>>) -> Self {
        Self {
            slots: [first, second],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn get(&mut self, slot: SessionSlot) -> Result<&mut Box<dyn Session>> {
        self.slots[slot.index()]
            .as_mut()
            .ok_or_else(|| DemoError::session_closed(slot.label()))
    }

    /// Roll back whatever is still open, then close. Safe to call repeatedly and
    /// on slots that never held a session.
    pub async fn close_all(&mut self) {
        for slot in SessionSlot::BOTH {
            let Some(mut session) = self.slots[slot.index()].take() else {
                continue;
            };

            if session.state().in_transaction() {
                debug!(session = session.label(), "rolling back unfinished transaction");
                if let Err(err) = session.rollback().await {
                    warn!(session = session.label(), "rollback during cleanup failed: {}", err);
                }
            }
            if let Err(err) = session.close().await {
                warn!(session = session.label(), "close failed: {}", err);
            }
        }
    }
}

pub struct Runner<'a> {
    connector: &'a dyn Connector,
}

impl<'a> Runner<'a> {
    pub fn new(connector: &'a dyn Connector) -> Self {
        Self { connector }
    }

    /// Run several scenarios back to back, each with fresh sessions.
    pub async fn run_all(
        &self,
        scenarios: &[Scenario],
        reporter: &mut dyn Reporter,
    ) -> Vec<RunReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run(scenario, reporter).await);
        }
        reports
    }

    pub async fn run(&self, scenario: &Scenario, reporter: &mut dyn Reporter) -> RunReport {
        let span = info_span!(
            "scenario",
            name = %scenario.name,
            isolation = %scenario.isolation
        );
        self.run_inner(scenario, reporter).instrument(span).await
    }

    async fn run_inner(&self, scenario: &Scenario, reporter: &mut dyn Reporter) -> RunReport {
        info!("starting {} demo", scenario.anomaly);

        let first = open_session(self.connector, SessionSlot::First.label(), reporter).await;
        let second = open_session(self.connector, SessionSlot::Second.label(), reporter).await;
        let mut sessions = SessionPair::new(first, second);

        let mut observations = Vec::new();
        let outcome = if sessions.is_complete() {
            match drive(scenario, &mut sessions, &mut observations, reporter).await {
                Ok(()) => Outcome::Completed,
                Err(err) => {
                    error!("demo aborted: {}", err);
                    reporter.failure(&err.to_string());
                    Outcome::Aborted(err.to_string())
                }
            }
        } else {
            reporter.line("Failed to create database connections");
            Outcome::ConnectFailed
        };

        sessions.close_all().await;

        let verdict = scenario.verdict(&observations);
        if outcome != Outcome::ConnectFailed {
            reporter.line(&verdict.to_string());
        }
        info!(?outcome, "finished {} demo", scenario.anomaly);

        RunReport {
            scenario: scenario.name.clone(),
            observations,
            outcome,
            verdict,
        }
    }
}

async fn drive(
    scenario: &Scenario,
    sessions: &mut SessionPair,
    observations: &mut Vec<Observation>,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    for step in &scenario.steps {
        let slot = step.session();
        let n = slot.number();
        let session = sessions.get(slot)?;

        match step {
            Step::Begin(_) => {
                reporter.step(&format!("Transaction {} started", n), Local::now());
                session.begin(scenario.isolation).await?;
            }
            Step::Update(_) => {
                reporter.step(
                    &format!("Transaction {} UPDATE balance = {}", n, SENTINEL_BALANCE),
                    Local::now(),
                );
                let rows = session.update_balance().await?;
                debug!(session = session.label(), rows, "update applied");
            }
            Step::Read { description, .. } => {
                let balance = session.fetch_balance().await?;
                let observation = Observation::now(session.label(), description.as_str(), balance);
                reporter.observation(&observation);
                observations.push(observation);
            }
            Step::Commit(_) => {
                reporter.step(&format!("Transaction {} commit()", n), Local::now());
                session.commit().await?;
            }
            Step::Rollback(_) => {
                reporter.step(&format!("Transaction {} rollback()", n), Local::now());
                session.rollback().await?;
            }
        }
    }
    Ok(())
}
