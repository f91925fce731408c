use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;

use spdlog::{debug, info, warn};

use crate::config::Persistence;
use crate::editor::PostDraft;
use crate::record::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Posts,
    Comments,
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Posts => write!(f, "posts"),
            Collection::Comments => write!(f, "comments"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange<'a> {
    pub collection: Collection,
    pub id: &'a RecordId,
    pub status: &'static str,
}

/// Recoverable failure reported by the persistence endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistError {
    pub message: String,
}

impl PersistError {
    pub fn new(message: impl Into<String>) -> Self {
        PersistError { message: message.into() }
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "persistence failed: {}", self.message)
    }
}

impl Error for PersistError {}

/// Where confirmed changes go. Calls for different ids may resolve in any
/// order; the desk never has two calls outstanding for the same id.
pub trait PersistenceEndpoint {
    fn persist_status(&self, change: StatusChange<'_>) -> impl Future<Output=Result<(), PersistError>>;

    fn persist_draft(&self, draft: &PostDraft) -> impl Future<Output=Result<(), PersistError>>;
}

/// Stand-in endpoint: waits `latency`, then accepts everything except the
/// ids listed as failing.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEndpoint {
    latency: Duration,
    failing_ids: Vec<String>,
}

impl SimulatedEndpoint {
    pub fn new(settings: &Persistence) -> Self {
        SimulatedEndpoint {
            latency: Duration::from_millis(settings.latency_ms),
            failing_ids: settings.failing_ids.clone(),
        }
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn refuses(&self, id: &str) -> bool {
        self.failing_ids.iter().any(|failing| failing == id)
    }
}

impl PersistenceEndpoint for SimulatedEndpoint {
    async fn persist_status(&self, change: StatusChange<'_>) -> Result<(), PersistError> {
        self.wait().await;

        let id = change.id.to_string();
        if self.refuses(&id) {
            warn!("Refusing {} status change for {} to {}", change.collection, id, change.status);
            return Err(PersistError::new(format!("{} {} could not be set to {}", change.collection, id, change.status)));
        }

        info!("Stored {} status for {}: {}", change.collection, id, change.status);
        Ok(())
    }

    async fn persist_draft(&self, draft: &PostDraft) -> Result<(), PersistError> {
        self.wait().await;

        let id = draft.id.to_string();
        if self.refuses(&id) {
            warn!("Refusing draft {}", id);
            return Err(PersistError::new(format!("draft {} could not be saved", id)));
        }

        match serde_json::to_string(draft) {
            Ok(json) => debug!("Stored draft {}: {}", id, json),
            Err(e) => debug!("Stored draft {} (not printable: {})", id, e),
        }
        info!("Stored draft {} as {}", id, draft.status.as_str());
        Ok(())
    }
}
