//! SQLite storage for the sync attempt log.

mod model;
mod repository;

pub use model::{NewSyncMetadataDB, SyncMetadataDB};
pub use repository::SyncMetadataRepository;
