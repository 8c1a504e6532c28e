//! MySQL-backed sessions.
//!
//! Each session owns one `MySqlConnection` (no pool: the demo needs exactly
//! two independent connections). Every statement is passed as a bare `&str`
//! without arguments, which sqlx sends over the text protocol: transaction
//! control cannot be prepared, and `SET TRANSACTION ISOLATION LEVEL` has to
//! precede `START TRANSACTION` on the same connection.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Executor, Row};
use tracing::debug;

use crate::config::DbConfig;
use crate::error::{DemoError, Result};
use crate::factory::Connector;
use crate::isolation::IsolationLevel;
use crate::session::{
    Balance, Session, SessionState, ACCOUNT, SELECT_BALANCE_SQL, UPDATE_BALANCE_SQL,
};

/// Statement that pins the isolation level of the next transaction only
pub fn set_isolation_sql(level: IsolationLevel) -> String {
    format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql())
}

/// Build driver options from the config; unset fields keep driver defaults.
pub fn connect_options(config: &DbConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new();
    if let Some(host) = &config.host {
        options = options.host(host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }
    options
}

/// Opens one `MySqlConnection` per session
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: DbConfig,
}

impl MySqlConnector {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn backend(&self) -> &str {
        "MySQL database"
    }

    async fn connect(&self, label: &str) -> Result<Box<dyn Session>> {
        debug!(
            session = label,
            host = ?self.config.host,
            database = ?self.config.database,
            "connecting"
        );
        let options = connect_options(&self.config);
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|err| DemoError::connect(label, err.to_string()))?;
        Ok(Box::new(MySqlSession::new(label, conn)))
    }
}

/// A live MySQL connection plus the transaction state the runner relies on
pub struct MySqlSession {
    label: String,
    conn: Option<MySqlConnection>,
    state: SessionState,
}

impl MySqlSession {
    pub fn new(label: impl Into<String>, conn: MySqlConnection) -> Self {
        Self {
            label: label.into(),
            conn: Some(conn),
            state: SessionState::Idle,
        }
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(DemoError::session_closed(&self.label)),
        }
    }

    async fn run(&mut self, sql: &str) -> Result<u64> {
        debug!(session = %self.label, sql, "execute");
        let conn = self.conn()?;
        let done = conn.execute(sql).await?;
        Ok(done.rows_affected())
    }
}

fn decode_balance(row: &MySqlRow) -> Result<Balance> {
    // Text protocol: every column arrives as its string form regardless of type.
    let text: Option<String> = row.try_get_unchecked(0)?;
    parse_balance_text(text.as_deref())
}

fn parse_balance_text(text: Option<&str>) -> Result<Balance> {
    match text {
        Some(text) => text.parse(),
        None => Err(DemoError::invalid_balance("NULL")),
    }
}

#[async_trait]
impl Session for MySqlSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> SessionState {
        self.state
    }

    async fn begin(&mut self, level: IsolationLevel) -> Result<()> {
        self.run(&set_isolation_sql(level)).await?;
        self.run("START TRANSACTION").await?;
        self.state = SessionState::InTransaction(level);
        Ok(())
    }

    async fn fetch_balance(&mut self) -> Result<Balance> {
        debug!(session = %self.label, sql = SELECT_BALANCE_SQL, "fetch");
        let conn = self.conn()?;
        let row = conn.fetch_optional(SELECT_BALANCE_SQL).await?;
        match row {
            Some(row) => decode_balance(&row),
            None => Err(DemoError::account_not_found(ACCOUNT)),
        }
    }

    async fn update_balance(&mut self) -> Result<u64> {
        self.run(UPDATE_BALANCE_SQL).await
    }

    async fn commit(&mut self) -> Result<()> {
        self.run("COMMIT").await?;
        self.state = SessionState::Idle;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.run("ROLLBACK").await?;
        self.state = SessionState::Idle;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state = SessionState::Closed;
        match self.conn.take() {
            Some(conn) => {
                debug!(session = %self.label, "closing connection");
                conn.close().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
