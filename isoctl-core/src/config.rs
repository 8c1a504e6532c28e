//! Connection settings for the demo sessions.
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file. The variable names are the bare lowercase `host`, `user`,
//! `password`, `database` (plus an optional `port`). Nothing is validated
//! here: a missing value falls through to the driver default and a wrong
//! one is reported by the driver when the session is opened.

use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

pub const HOST_VAR: &str = "host";
pub const PORT_VAR: &str = "port";
pub const USER_VAR: &str = "user";
pub const PASSWORD_VAR: &str = "password";
pub const DATABASE_VAR: &str = "database";

/// Credentials and address for one MySQL server
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DbConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl DbConfig {
    /// Load `.env` (if present) into the environment, then read the variables.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => warn!("ignoring unreadable .env file: {}", err),
        }
        Self::from_env()
    }

    /// Read the connection variables from the current process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Read the connection variables from a dotenv file without touching the
    /// process environment.
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, dotenvy::Error> {
        let vars = dotenvy::from_path_iter(path.as_ref())?.collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_vars(vars))
    }

    /// Build a config from `(name, value)` pairs. Unknown names are ignored,
    /// empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value: String = value.into();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                HOST_VAR => config.host = Some(value),
                USER_VAR => config.user = Some(value),
                PASSWORD_VAR => config.password = Some(value),
                DATABASE_VAR => config.database = Some(value),
                PORT_VAR => match value.parse() {
                    Ok(port) => config.port = Some(port),
                    Err(_) => warn!("ignoring non-numeric port '{}'", value),
                },
                _ => {}
            }
        }
        config
    }

    /// Overlay explicitly supplied values on top of this config.
    pub fn merge(mut self, other: DbConfig) -> Self {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        self
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}
