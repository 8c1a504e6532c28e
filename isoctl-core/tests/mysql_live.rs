//! Scenario runs against a real MySQL server.
//!
//! Integration tests require a real database. Point the usual variables at a
//! scratch schema and run:
//!
//! ```text
//! host=127.0.0.1 user=root password=... database=isolation_demo \
//!     cargo test -p isoctl-core --test mysql_live -- --ignored
//! ```
//!
//! The `accounts` table is created if missing and `Alice` is reset to 1000
//! before every test, so run them one at a time (`--test-threads=1`).

use isoctl_core::mysql::connect_options;
use isoctl_core::{
    Balance, DbConfig, IsolationLevel, MySqlConnector, Outcome, RecordingReporter, Runner,
    Scenario, SENTINEL_BALANCE,
};
use sqlx::mysql::MySqlConnection;
use sqlx::Connection;

const B0: Balance = Balance(1000.0);

async fn reset_accounts(config: &DbConfig) {
    let mut conn = MySqlConnection::connect_with(&connect_options(config))
        .await
        .expect("connect for fixture setup");
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS accounts (\
             name VARCHAR(64) PRIMARY KEY, \
             balance DECIMAL(12, 2) NOT NULL\
         ) ENGINE = InnoDB;\
         REPLACE INTO accounts (name, balance) VALUES ('Alice', 1000);",
    )
    .execute(&mut conn)
    .await
    .expect("seed accounts");
    conn.close().await.expect("close fixture connection");
}

async fn run_live(scenario: Scenario) -> isoctl_core::RunReport {
    let config = DbConfig::load();
    reset_accounts(&config).await;

    let connector = MySqlConnector::new(config);
    let mut reporter = RecordingReporter::new();
    Runner::new(&connector).run(&scenario, &mut reporter).await
}

#[tokio::test]
#[ignore = "requires database"]
async fn live_dirty_read() {
    let report = run_live(Scenario::dirty_read(IsolationLevel::ReadUncommitted)).await;

    assert_eq!(report.outcome, Outcome::Completed);
    let seen: Vec<Balance> = report.observations.iter().map(|o| o.balance).collect();
    assert_eq!(seen, vec![SENTINEL_BALANCE, B0]);
}

#[tokio::test]
#[ignore = "requires database"]
async fn live_non_repeatable_read() {
    let report = run_live(Scenario::non_repeatable_read(IsolationLevel::ReadCommitted)).await;

    assert_eq!(report.outcome, Outcome::Completed);
    let seen: Vec<Balance> = report.observations.iter().map(|o| o.balance).collect();
    assert_eq!(seen, vec![B0, B0, SENTINEL_BALANCE]);
}

#[tokio::test]
#[ignore = "requires database"]
async fn live_bad_credentials() {
    let config = DbConfig::load().merge(DbConfig {
        password: Some("definitely-not-the-password".into()),
        ..Default::default()
    });
    let connector = MySqlConnector::new(config);
    let mut reporter = RecordingReporter::new();

    let report = Runner::new(&connector)
        .run(
            &Scenario::dirty_read(IsolationLevel::ReadUncommitted),
            &mut reporter,
        )
        .await;

    assert_eq!(report.outcome, Outcome::ConnectFailed);
    assert!(reporter.contains("Failed to create database connections"));
}
