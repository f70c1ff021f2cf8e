//! Database bootstrap: file location, migrations, pool, and the writer.

pub mod write_actor;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::{Connection, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};

use clientsync_core::errors::{DatabaseError, Error, Result};
use clientsync_core::settings::DATABASE_FILE_NAME;

use crate::errors::StorageError;

pub use write_actor::{spawn_writer, WriteHandle};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const POOL_MAX_SIZE: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Pragmas applied to every pooled connection on checkout.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub busy_timeout: Duration,
    pub enable_wal: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: BUSY_TIMEOUT,
            enable_wal: true,
        }
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        let mut pragmas = format!(
            "PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        );
        if self.enable_wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas).map_err(r2d2::Error::QueryError)
    }
}

/// Ensures `app_data_dir` exists and returns the database path inside it.
pub fn init(app_data_dir: &str) -> Result<String> {
    std::fs::create_dir_all(app_data_dir).map_err(|e| {
        Error::Schema(format!(
            "Cannot create data directory '{}': {}",
            app_data_dir, e
        ))
    })?;
    let db_path = Path::new(app_data_dir).join(DATABASE_FILE_NAME);
    Ok(db_path.to_string_lossy().to_string())
}

/// Creates the three tables if absent. Safe to call on every start.
pub fn run_migrations(db_path: &str) -> Result<()> {
    let mut conn = SqliteConnection::establish(db_path)
        .map_err(|e| Error::Schema(format!("Cannot open database '{}': {}", db_path, e)))?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

    if applied.is_empty() {
        debug!("[LocalStore] Schema is up to date");
    } else {
        info!("[LocalStore] Applied {} migration(s)", applied.len());
    }
    Ok(())
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .connection_customizer(Box::new(ConnectionOptions::default()))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::PoolCreationFailed(e.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| Error::Database(DatabaseError::ConnectionFailed(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::prelude::*;
    use diesel::sql_types::Text;
    use tempfile::tempdir;

    #[derive(QueryableByName)]
    struct TableName {
        #[diesel(sql_type = Text)]
        name: String,
    }

    fn table_names(pool: &DbPool) -> Vec<String> {
        let mut conn = get_connection(pool).expect("conn");
        diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' AND name != '__diesel_schema_migrations' ORDER BY name",
        )
        .load::<TableName>(&mut conn)
        .expect("list tables")
        .into_iter()
        .map(|t| t.name)
        .collect()
    }

    #[test]
    fn migrations_create_tables_and_are_idempotent() {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("first run");
        run_migrations(&db_path).expect("second run");

        let pool = create_pool(&db_path).expect("create pool");
        assert_eq!(
            table_names(&pool),
            vec!["clients", "services", "sync_metadata"]
        );
    }

    #[test]
    fn unopenable_database_is_a_schema_error() {
        let dir = tempdir().expect("tempdir");
        // A directory cannot be opened as a database file.
        let err = run_migrations(&dir.path().to_string_lossy()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn corrupt_database_file_is_a_schema_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(DATABASE_FILE_NAME);
        std::fs::write(&path, vec![0x5a_u8; 4096]).expect("write garbage");

        let err = run_migrations(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn writer_rolls_back_failed_jobs() {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());

        let result: Result<()> = writer
            .exec(|conn| {
                diesel::sql_query(
                    "INSERT INTO clients (client_id, name, last_sync) \
                     VALUES ('c-1', 'Ana', '2024-01-01T00:00:00.000Z')",
                )
                .execute(conn)
                .map_err(|e| Error::persistence(e.to_string()))?;
                Err(Error::persistence_at(1, "boom"))
            })
            .await;
        assert_eq!(result.unwrap_err().record_index(), Some(1));

        let count: i64 = writer
            .exec(|conn| {
                crate::schema::clients::table
                    .count()
                    .get_result(conn)
                    .map_err(|e| Error::persistence(e.to_string()))
            })
            .await
            .expect("count");
        assert_eq!(count, 0);
    }
}
