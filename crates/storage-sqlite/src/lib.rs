//! SQLite-backed local store for clients, service visits and the sync log.
//!
//! Reads go through an r2d2 pool; every write is funneled through a single
//! writer thread ([`db::WriteHandle`]) and committed as one transaction.

pub mod clients;
pub mod db;
pub mod errors;
pub mod schema;
pub mod sync;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::{debug, info};

use clientsync_core::errors::{Error, Result};
use clientsync_core::sync::SyncGate;

pub use clients::ClientRepository;
pub use db::{DbPool, WriteHandle};
pub use errors::StorageError;
pub use sync::SyncMetadataRepository;

/// One gate per database file for the whole process.
fn shared_sync_gate(db_path: &str) -> SyncGate {
    static GATES: OnceLock<Mutex<HashMap<String, SyncGate>>> = OnceLock::new();

    let key = std::fs::canonicalize(db_path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| db_path.to_string());
    let mut gates = GATES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    gates
        .entry(key)
        .or_insert_with(|| {
            debug!("[LocalStore] New sync gate for {}", db_path);
            SyncGate::new()
        })
        .clone()
}

/// Opened database with its repositories.
pub struct LocalStore {
    db_path: String,
    clients: Arc<ClientRepository>,
    sync_metadata: Arc<SyncMetadataRepository>,
    sync_gate: SyncGate,
}

impl LocalStore {
    /// Opens (creating if needed) `clientsync.db` inside `data_dir` and brings
    /// the schema up to date. Failures are [`Error::Schema`] and fatal.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_string_lossy().to_string();
        let db_path = db::init(&data_dir)?;
        Self::open_file(&db_path)
    }

    /// Opens a database at an explicit file path.
    pub fn open_file(db_path: &str) -> Result<Self> {
        db::run_migrations(db_path)?;
        let pool = db::create_pool(db_path).map_err(|e| Error::Schema(e.to_string()))?;
        let writer = db::spawn_writer(pool.as_ref().clone());

        info!("[LocalStore] Opened {}", db_path);
        Ok(Self {
            db_path: db_path.to_string(),
            clients: Arc::new(ClientRepository::new(Arc::clone(&pool), writer.clone())),
            sync_metadata: Arc::new(SyncMetadataRepository::new(pool, writer)),
            sync_gate: shared_sync_gate(db_path),
        })
    }

    /// Creates any missing tables. Idempotent.
    pub fn initialize_schema(&self) -> Result<()> {
        db::run_migrations(&self.db_path)
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn clients(&self) -> Arc<ClientRepository> {
        Arc::clone(&self.clients)
    }

    pub fn sync_metadata(&self) -> Arc<SyncMetadataRepository> {
        Arc::clone(&self.sync_metadata)
    }

    /// Running flag shared with every other handle on this database file.
    pub fn sync_gate(&self) -> SyncGate {
        self.sync_gate.clone()
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientsync_core::clients::{Client, ClientRepositoryTrait};
    use tempfile::tempdir;

    #[tokio::test]
    async fn reopening_keeps_data_and_schema() {
        let dir = tempdir().expect("tempdir");

        let store = LocalStore::open(dir.path()).expect("open");
        store
            .clients()
            .upsert_clients(vec![Client::new("c-1", "Ana")])
            .await
            .expect("upsert");
        store.initialize_schema().expect("idempotent");
        let path = store.db_path().to_string();
        drop(store);

        let reopened = LocalStore::open_file(&path).expect("reopen");
        assert_eq!(reopened.clients().count_clients().unwrap(), 1);
        assert!(path.ends_with("clientsync.db"));
    }

    #[test]
    fn handles_on_one_file_share_a_sync_gate() {
        let dir = tempdir().expect("tempdir");
        let other_dir = tempdir().expect("tempdir");

        let first = LocalStore::open(dir.path()).expect("open");
        let second = LocalStore::open_file(first.db_path()).expect("open again");
        let unrelated = LocalStore::open(other_dir.path()).expect("open other");

        assert!(first.sync_gate().shares_with(&second.sync_gate()));
        assert!(!first.sync_gate().shares_with(&unrelated.sync_gate()));
    }
}
