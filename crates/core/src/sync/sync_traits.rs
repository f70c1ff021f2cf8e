use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DeltaPayload, NewSyncMetadata, SyncMetadata};
use crate::errors::Result;

/// Append-only log of sync attempts.
#[async_trait]
pub trait SyncMetadataRepositoryTrait: Send + Sync {
    /// Appends one entry stamped with the current time. Never mutates older rows.
    async fn append_sync_metadata(&self, entry: NewSyncMetadata) -> Result<SyncMetadata>;

    /// Most recent entry of any status, or `None` when nothing was ever logged.
    fn latest_sync_metadata(&self) -> Result<Option<SyncMetadata>>;

    /// Most recent `success` entry; its cursor bounds the next delta.
    fn latest_successful_sync(&self) -> Result<Option<SyncMetadata>>;

    /// Newest-first audit history.
    fn sync_history(&self, limit: i64) -> Result<Vec<SyncMetadata>>;
}

/// Source of truth the local store replicates from.
#[async_trait]
pub trait RemoteSyncSource: Send + Sync {
    /// Single attempt, no retries. `None` fetches the full data set; otherwise
    /// only records extracted strictly after `since`.
    async fn fetch_delta(&self, since: Option<DateTime<Utc>>) -> Result<DeltaPayload>;

    /// Best-effort reachability probe; `false` on any failure.
    async fn check_health(&self) -> bool;
}
