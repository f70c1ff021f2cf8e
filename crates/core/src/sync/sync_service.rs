//! Sync orchestrator: one pull-and-merge cycle at a time.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use super::{
    LastSyncOutcome, NewSyncMetadata, RemoteSyncSource, SyncMetadataRepositoryTrait, SyncPhase,
    SyncResult, SyncStatusSummary,
};
use crate::clients::ClientRepositoryTrait;
use crate::errors::Result;
use crate::returns::ReturnWindow;
use crate::utils::time_utils::today_utc;

/// Running flag for one store. Clones share the flag, so every orchestrator
/// built over the same store sees the same `Idle`/`Running` state.
#[derive(Clone, Default)]
pub struct SyncGate {
    phase: Arc<Mutex<SyncPhase>>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when both handles guard the same store.
    pub fn shares_with(&self, other: &SyncGate) -> bool {
        Arc::ptr_eq(&self.phase, &other.phase)
    }

    /// Compare-and-set `Idle -> Running`. Overlapping calls are rejected, not queued.
    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == SyncPhase::Running {
            return None;
        }
        *phase = SyncPhase::Running;
        Some(RunningGuard { phase: &self.phase })
    }
}

impl std::fmt::Debug for SyncGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SyncGate").field(&self.phase()).finish()
    }
}

/// Marks the store as syncing; returns it to idle when dropped, so a
/// cancelled or panicking cycle still releases the gate.
struct RunningGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
}

impl RunningGuard<'_> {
    fn finish(&self, outcome: SyncPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("[ClientSync] {:?} -> {:?}", *phase, outcome);
        *phase = outcome;
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        *phase = SyncPhase::Idle;
    }
}

struct CycleCounts {
    clients: usize,
    services: usize,
    sync_date: DateTime<Utc>,
}

/// Coordinates LocalStore and the remote. The only writer of client and
/// service rows.
pub struct SyncService {
    client_repository: Arc<dyn ClientRepositoryTrait>,
    metadata_repository: Arc<dyn SyncMetadataRepositoryTrait>,
    remote: Arc<dyn RemoteSyncSource>,
    status_window: ReturnWindow,
    gate: SyncGate,
}

impl SyncService {
    pub fn new(
        client_repository: Arc<dyn ClientRepositoryTrait>,
        metadata_repository: Arc<dyn SyncMetadataRepositoryTrait>,
        remote: Arc<dyn RemoteSyncSource>,
        status_window: ReturnWindow,
        gate: SyncGate,
    ) -> Self {
        Self {
            client_repository,
            metadata_repository,
            remote,
            status_window,
            gate,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.gate.phase()
    }

    pub fn status_window(&self) -> ReturnWindow {
        self.status_window
    }

    /// Runs one cycle. Always returns a result; failures are logged to the
    /// metadata table and reported through [`SyncResult::error`].
    pub async fn perform_sync(&self) -> SyncResult {
        let Some(guard) = self.gate.try_begin() else {
            info!("[ClientSync] Sync already in progress, skipping");
            return SyncResult::already_running();
        };

        let started_at = Instant::now();
        info!("[ClientSync] Starting sync cycle");

        match self.run_cycle().await {
            Ok(counts) => {
                guard.finish(SyncPhase::Succeeded);
                let duration_ms = started_at.elapsed().as_millis() as i64;
                info!(
                    "[ClientSync] Sync complete clients={} services={} duration_ms={}",
                    counts.clients, counts.services, duration_ms
                );
                SyncResult::completed(counts.clients, counts.services, counts.sync_date, duration_ms)
            }
            Err(err) => {
                let message = err.to_string();
                let retryable = err.is_retryable();
                error!(
                    "[ClientSync] Sync failed (retryable={}): {}",
                    retryable, message
                );
                if let Err(log_err) = self
                    .metadata_repository
                    .append_sync_metadata(NewSyncMetadata::error(message.clone()))
                    .await
                {
                    warn!(
                        "[ClientSync] Could not record failed sync in metadata: {}",
                        log_err
                    );
                }
                guard.finish(SyncPhase::Failed);
                SyncResult::failed(message, retryable, started_at.elapsed().as_millis() as i64)
            }
        }
    }

    async fn run_cycle(&self) -> Result<CycleCounts> {
        let since = self
            .metadata_repository
            .latest_successful_sync()?
            .map(|entry| entry.effective_cursor());
        debug!("[ClientSync] Fetching delta since {:?}", since);

        // Remote phase: nothing local is touched until the whole payload is in hand.
        let delta = self.remote.fetch_delta(since).await?;

        let client_count = delta.clients.len();
        let service_count = delta.services.len();

        if !delta.clients.is_empty() {
            self.client_repository.upsert_clients(delta.clients).await?;
            debug!("[ClientSync] Merged {} clients", client_count);
        }
        if !delta.services.is_empty() {
            self.client_repository
                .upsert_service_records(delta.services)
                .await?;
            debug!("[ClientSync] Merged {} services", service_count);
        }

        self.metadata_repository
            .append_sync_metadata(NewSyncMetadata::success(delta.sync_date))
            .await?;

        Ok(CycleCounts {
            clients: client_count,
            services: service_count,
            sync_date: delta.sync_date,
        })
    }

    /// Status for the current UTC date.
    pub fn get_sync_status(&self) -> SyncStatusSummary {
        self.get_sync_status_on(today_utc())
    }

    /// Composed read; never mutates and never fails. Read errors degrade to
    /// [`SyncStatusSummary::unavailable`].
    pub fn get_sync_status_on(&self, today: NaiveDate) -> SyncStatusSummary {
        match self.read_status(today) {
            Ok(summary) => summary,
            Err(err) => {
                warn!("[ClientSync] Failed to read sync status: {}", err);
                SyncStatusSummary::unavailable()
            }
        }
    }

    fn read_status(&self, today: NaiveDate) -> Result<SyncStatusSummary> {
        let latest = self.metadata_repository.latest_sync_metadata()?;
        let total_clients = self.client_repository.count_clients()?;
        let pending_returns = self
            .client_repository
            .query_return_candidates(&self.status_window, today)?
            .len();

        Ok(SyncStatusSummary {
            last_sync_date: latest.as_ref().map(|entry| entry.last_sync_date),
            last_outcome: latest
                .map(|entry| LastSyncOutcome::from(entry.sync_status))
                .unwrap_or(LastSyncOutcome::Never),
            total_clients,
            pending_returns,
        })
    }

    pub async fn check_remote_health(&self) -> bool {
        self.remote.check_health().await
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("phase", &self.phase())
            .field("status_window", &self.status_window)
            .finish()
    }
}

