//! Connection factory.
//!
//! A failed connection is reported and turned into `None`; the caller decides
//! whether to go on. There are no retries.

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::Result;
use crate::report::Reporter;
use crate::session::Session;

/// Something that can open independent sessions on one database
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name used in the `Connected to ...` trace line
    fn backend(&self) -> &str;

    async fn connect(&self, label: &str) -> Result<Box<dyn Session>>;
}

/// Open one session, reporting the outcome instead of propagating failure.
pub async fn open_session(
    connector: &dyn Connector,
    label: &str,
    reporter: &mut dyn Reporter,
) -> Option<Box<dyn Session>> {
    match connector.connect(label).await {
        Ok(session) => {
            info!(session = label, backend = connector.backend(), "connected");
            reporter.line(&format!("Connected to {}", connector.backend()));
            Some(session)
        }
        Err(err) => {
            error!(session = label, "connection failed: {}", err);
            reporter.failure(&err.to_string());
            None
        }
    }
}
