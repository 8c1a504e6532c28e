//! isoctl CLI - watch SQL isolation levels at work
//!
//! Opens two sessions against the `accounts` table and interleaves their
//! statements to show:
//! - dirty reads under READ UNCOMMITTED (`dirty-read`)
//! - non-repeatable reads under READ COMMITTED (`non-repeatable-read`)
//!
//! Connection settings come from the `host`, `user`, `password`, `database`
//! (and optional `port`) environment variables, or a `.env` file. Database
//! errors are printed and the process still exits 0.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use isoctl_core::{
    Balance, Connector, DbConfig, IsolationLevel, MemoryConnector, MemoryStore, MySqlConnector,
    Reporter, Runner, Scenario, StdoutReporter,
};
use tracing::debug;

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "isoctl",
    author,
    version,
    about = "Demonstrate SQL transaction isolation levels with two interleaved sessions",
    long_about = "Drive two database sessions through a fixed interleaving of reads, writes, \
                  commits and rollbacks on the `accounts` table and print what each one sees. \
                  Without a subcommand both demos run."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Use a built-in in-memory database seeded with Alice instead of MySQL
    #[arg(long, global = true)]
    in_memory: bool,

    /// Alice's starting balance in --in-memory mode
    #[arg(long, global = true, value_name = "AMOUNT", default_value = "1000")]
    seed_balance: Balance,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides for the environment-provided connection settings
#[derive(Args, Debug)]
struct ConnectionArgs {
    /// MySQL host (overrides $host)
    #[arg(long, global = true)]
    host: Option<String>,

    /// MySQL port (overrides $port)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// MySQL user (overrides $user)
    #[arg(long, global = true)]
    user: Option<String>,

    /// MySQL password (overrides $password; prefer the environment)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Database holding the accounts table (overrides $database)
    #[arg(long, global = true)]
    database: Option<String>,
}

impl From<ConnectionArgs> for DbConfig {
    fn from(args: ConnectionArgs) -> Self {
        DbConfig {
            host: args.host,
            port: args.port,
            user: args.user,
            password: args.password,
            database: args.database,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Uncommitted UPDATE in session1, read from session2, then roll back
    DirtyRead(LevelArgs),
    /// Read in session1, UPDATE and commit in session2, read again in session1
    NonRepeatableRead(LevelArgs),
    /// Run both demos at their classic isolation levels
    All,
}

#[derive(Args, Debug)]
struct LevelArgs {
    /// Isolation level for both sessions (read-uncommitted, read-committed,
    /// repeatable-read, serializable)
    #[arg(long, short, value_name = "LEVEL")]
    level: Option<IsolationLevel>,
}

impl Commands {
    fn scenarios(&self) -> Vec<Scenario> {
        match self {
            Commands::DirtyRead(args) => vec![Scenario::dirty_read(
                args.level.unwrap_or(IsolationLevel::ReadUncommitted),
            )],
            Commands::NonRepeatableRead(args) => vec![Scenario::non_repeatable_read(
                args.level.unwrap_or(IsolationLevel::ReadCommitted),
            )],
            Commands::All => Scenario::defaults(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let scenarios = cli.command.as_ref().unwrap_or(&Commands::All).scenarios();

    let connector: Box<dyn Connector> = if cli.in_memory {
        let store = MemoryStore::seeded(cli.seed_balance);
        Box::new(MemoryConnector::new(store))
    } else {
        let config = DbConfig::load().merge(cli.connection.into());
        debug!(?config, "connection settings");
        Box::new(MySqlConnector::new(config))
    };

    run_scenarios(connector.as_ref(), &scenarios).await;
    Ok(())
}

async fn run_scenarios(connector: &dyn Connector, scenarios: &[Scenario]) {
    let runner = Runner::new(connector);
    let mut reporter = StdoutReporter;

    for (i, scenario) in scenarios.iter().enumerate() {
        if i > 0 {
            reporter.line("");
        }
        reporter.line(&format!("== {} ({}) ==", scenario.name, scenario.isolation));
        runner.run(scenario, &mut reporter).await;
    }
}
