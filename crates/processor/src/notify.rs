use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ProcessorError, Result};

/// Post-commit fan-out. Both notifications are best-effort: a failure here is
/// logged by the dispatcher and never re-triggers the transaction.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Asks the downstream indexer to re-index one score.
    async fn reindex(&self, score_id: i64) -> Result<()>;

    /// Announces that a score has been processed at the given version.
    async fn score_processed(&self, score_id: i64, version: i16) -> Result<()>;
}

/// Default sink when no transport is wired up: log and move on.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn reindex(&self, score_id: i64) -> Result<()> {
        debug!(score_id, "reindex requested");
        Ok(())
    }

    async fn score_processed(&self, score_id: i64, version: i16) -> Result<()> {
        debug!(score_id, version, "score processed");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Reindex { score_id: i64 },
    Processed { score_id: i64, version: i16 },
}

/// Bridges notifications onto an in-process channel, from where an embedding
/// service forwards them to its real transport.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn reindex(&self, score_id: i64) -> Result<()> {
        self.sender
            .send(Notification::Reindex { score_id })
            .map_err(|e| ProcessorError::Notification(e.to_string()))
    }

    async fn score_processed(&self, score_id: i64, version: i16) -> Result<()> {
        self.sender
            .send(Notification::Processed { score_id, version })
            .map_err(|e| ProcessorError::Notification(e.to_string()))
    }
}
