use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::types::AggregatedSnapshot;

/// The aggregated multi-site read.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<AggregatedSnapshot>;
}

/// Cached access to the aggregated snapshot.
///
/// The snapshot is read-only while planning. After a batch mutates server
/// state the caller must call [`ScheduleRepository::invalidate`]; nothing
/// refreshes it implicitly, so two reconciliations run back-to-back without
/// an invalidation in between plan against the same (stale) snapshot.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<AggregatedSnapshot>>;

    /// Drop the cached snapshot after `schedule_id` changed. `None` when the
    /// affected schedule has no id yet (fresh create).
    async fn invalidate(&self, schedule_id: Option<&str>);
}

/// Fetch-on-miss cache over a [`SnapshotSource`].
pub struct SnapshotCache<S> {
    source: S,
    cached: RwLock<Option<Arc<AggregatedSnapshot>>>,
}

impl<S: SnapshotSource> SnapshotCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<S: SnapshotSource> ScheduleRepository for SnapshotCache<S> {
    async fn snapshot(&self) -> Result<Arc<AggregatedSnapshot>> {
        if let Some(snapshot) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let mut slot = self.cached.write().await;
        // Another caller may have filled it while we waited for the lock.
        if let Some(snapshot) = slot.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        let snapshot = Arc::new(self.source.fetch().await?);
        debug!(sites = snapshot.sites.len(), "schedule snapshot fetched");
        *slot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn invalidate(&self, schedule_id: Option<&str>) {
        self.cached.write().await.take();
        info!(schedule_id = schedule_id.unwrap_or("<new>"), "schedule snapshot invalidated");
    }
}

/// Reads the aggregated snapshot from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch(&self) -> Result<AggregatedSnapshot> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SchedulerError::Snapshot(format!("{}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| SchedulerError::Snapshot(format!("{}: {e}", self.path.display())))
    }
}
