//! Fire-and-forget submission of finished sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::session::SessionSummary;
use crate::traits::{SavePayload, SessionStore};

/// Upper bound on the delay between two save attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Submits finished sessions to a [`SessionStore`] in the background.
///
/// Failures are logged and otherwise ignored. By default a failed save is
/// not retried; [`PersistenceReporter::with_retries`] enables a bounded
/// number of retries with exponential backoff.
#[derive(Clone)]
pub struct PersistenceReporter {
    store: Arc<dyn SessionStore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl PersistenceReporter {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            max_retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Serialize `summary` and submit it on a background task.
    ///
    /// The handle only exists so callers can wait for delivery before
    /// shutting down; its output carries no information.
    pub fn submit(&self, summary: SessionSummary) -> JoinHandle<()> {
        let payload = SavePayload::from_summary(&summary, Utc::now());
        let reporter = self.clone();
        tokio::spawn(async move {
            let session_id = summary.session_id;
            match reporter.deliver(&payload).await {
                Ok(()) => info!(session = %session_id, "session saved"),
                Err(e) => warn!(session = %session_id, "failed to save session: {e:#}"),
            }
        })
    }

    async fn deliver(&self, payload: &SavePayload) -> anyhow::Result<()> {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            match self.store.save(payload).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, "save failed, retrying in {delay:?}: {e:#}");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
