//! HTTP client for the client-sync server.
//!
//! Fetches incremental deltas of clients and service records from `GET /sync`
//! and probes `GET /health`. Responses are validated into the domain models
//! of `clientsync-core` before they leave this crate.

pub mod client;
pub mod error;
pub mod types;

pub use client::{RemoteSyncClient, DEFAULT_TIMEOUT_SECS};
pub use error::{ApiRetryClass, RemoteSyncError, Result};
pub use types::{HealthResponse, RemoteClient, RemoteService, SyncResponse};
