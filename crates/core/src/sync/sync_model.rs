//! Sync domain models: metadata log entries, deltas, cycle results and status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clients::{Client, ServiceRecord};
use crate::errors::{DatabaseError, Error};

/// Outcome recorded in the sync metadata log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(Error::Database(DatabaseError::Internal(format!(
                "Unknown sync status '{}'",
                other
            )))),
        }
    }
}

/// One row of the append-only sync log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Auto-incremented; orders entries.
    pub id: i64,
    /// When the attempt was recorded locally.
    pub last_sync_date: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// Server `sync_date` of a successful cycle; the next delta starts here.
    pub cursor: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SyncMetadata {
    /// Boundary for the next incremental fetch. Entries written without a
    /// server cursor fall back to their local timestamp.
    pub fn effective_cursor(&self) -> DateTime<Utc> {
        self.cursor.unwrap_or(self.last_sync_date)
    }
}

/// Values for a new log entry; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncMetadata {
    pub sync_status: SyncStatus,
    pub cursor: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl NewSyncMetadata {
    pub fn success(cursor: DateTime<Utc>) -> Self {
        Self {
            sync_status: SyncStatus::Success,
            cursor: Some(cursor),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            sync_status: SyncStatus::Error,
            cursor: None,
            error_message: Some(message.into()),
        }
    }
}

/// Records changed since a cursor, as returned by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaPayload {
    pub clients: Vec<Client>,
    pub services: Vec<ServiceRecord>,
    pub sync_date: DateTime<Utc>,
}

/// Orchestrator state token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResultStatus {
    Completed,
    AlreadyRunning,
    Failed,
}

/// Structured result of `perform_sync`; never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub status: SyncResultStatus,
    pub clients: usize,
    pub services: usize,
    pub error: Option<String>,
    /// Set on failures that came from the remote; a later attempt may succeed.
    pub retryable: bool,
    pub sync_date: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

impl SyncResult {
    pub fn completed(
        clients: usize,
        services: usize,
        sync_date: DateTime<Utc>,
        duration_ms: i64,
    ) -> Self {
        Self {
            status: SyncResultStatus::Completed,
            clients,
            services,
            error: None,
            retryable: false,
            sync_date: Some(sync_date),
            duration_ms,
        }
    }

    pub fn already_running() -> Self {
        Self {
            status: SyncResultStatus::AlreadyRunning,
            clients: 0,
            services: 0,
            error: None,
            retryable: false,
            sync_date: None,
            duration_ms: 0,
        }
    }

    pub fn failed(message: impl Into<String>, retryable: bool, duration_ms: i64) -> Self {
        Self {
            status: SyncResultStatus::Failed,
            clients: 0,
            services: 0,
            error: Some(message.into()),
            retryable,
            sync_date: None,
            duration_ms,
        }
    }

    pub fn success(&self) -> bool {
        self.status == SyncResultStatus::Completed
    }

    pub fn is_already_running(&self) -> bool {
        self.status == SyncResultStatus::AlreadyRunning
    }
}

/// Outcome of the most recent logged attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastSyncOutcome {
    Never,
    Success,
    Error,
}

impl From<SyncStatus> for LastSyncOutcome {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Success => Self::Success,
            SyncStatus::Error => Self::Error,
        }
    }
}

/// Read-only dashboard summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSummary {
    /// `None` means the store has never been synced (or could not be read).
    pub last_sync_date: Option<DateTime<Utc>>,
    pub last_outcome: LastSyncOutcome,
    pub total_clients: i64,
    pub pending_returns: usize,
}

impl SyncStatusSummary {
    /// Safe default when the local store cannot be read.
    pub fn unavailable() -> Self {
        Self {
            last_sync_date: None,
            last_outcome: LastSyncOutcome::Error,
            total_clients: 0,
            pending_returns: 0,
        }
    }

    pub fn last_sync_display(&self) -> String {
        match (self.last_sync_date, self.last_outcome) {
            (Some(date), _) => date.to_rfc3339(),
            (None, LastSyncOutcome::Error) => "unavailable".to_string(),
            (None, _) => "never".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sync_status_round_trips_through_storage_text() {
        for status in [SyncStatus::Success, SyncStatus::Error] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("pending".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn effective_cursor_prefers_server_date() {
        let local = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 5).unwrap();
        let server = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let mut entry = SyncMetadata {
            id: 1,
            last_sync_date: local,
            sync_status: SyncStatus::Success,
            cursor: Some(server),
            error_message: None,
        };
        assert_eq!(entry.effective_cursor(), server);
        entry.cursor = None;
        assert_eq!(entry.effective_cursor(), local);
    }

    #[test]
    fn status_display_distinguishes_never_from_unavailable() {
        let never = SyncStatusSummary {
            last_sync_date: None,
            last_outcome: LastSyncOutcome::Never,
            total_clients: 0,
            pending_returns: 0,
        };
        assert_eq!(never.last_sync_display(), "never");
        assert_eq!(SyncStatusSummary::unavailable().last_sync_display(), "unavailable");
    }
}
