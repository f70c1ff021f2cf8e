use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;

use clientsync_core::errors::{Error, Result};
use clientsync_core::sync::{NewSyncMetadata, SyncMetadata, SyncMetadataRepositoryTrait, SyncStatus};
use clientsync_core::utils::time_utils::format_timestamp;

use super::model::{NewSyncMetadataDB, SyncMetadataDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_metadata;

pub struct SyncMetadataRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SyncMetadataRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        SyncMetadataRepository { pool, writer }
    }
}

#[async_trait]
impl SyncMetadataRepositoryTrait for SyncMetadataRepository {
    async fn append_sync_metadata(&self, entry: NewSyncMetadata) -> Result<SyncMetadata> {
        let stored = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncMetadataDB> {
                let row = NewSyncMetadataDB::stamped(entry, &format_timestamp(&Utc::now()));
                diesel::insert_into(sync_metadata::table)
                    .values(&row)
                    .returning(SyncMetadataDB::as_returning())
                    .get_result(conn)
                    .map_err(|e| Error::persistence(format!("sync metadata: {}", e)))
            })
            .await?;

        debug!(
            "[LocalStore] Logged sync attempt #{} ({})",
            stored.id, stored.sync_status
        );
        SyncMetadata::try_from(stored)
    }

    fn latest_sync_metadata(&self) -> Result<Option<SyncMetadata>> {
        let mut conn = get_connection(&self.pool)?;
        sync_metadata::table
            .order(sync_metadata::id.desc())
            .select(SyncMetadataDB::as_select())
            .first::<SyncMetadataDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(SyncMetadata::try_from)
            .transpose()
    }

    fn latest_successful_sync(&self) -> Result<Option<SyncMetadata>> {
        let mut conn = get_connection(&self.pool)?;
        sync_metadata::table
            .filter(sync_metadata::sync_status.eq(SyncStatus::Success.as_str()))
            .order(sync_metadata::id.desc())
            .select(SyncMetadataDB::as_select())
            .first::<SyncMetadataDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(SyncMetadata::try_from)
            .transpose()
    }

    fn sync_history(&self, limit: i64) -> Result<Vec<SyncMetadata>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_metadata::table
            .order(sync_metadata::id.desc())
            .limit(limit.max(0))
            .select(SyncMetadataDB::as_select())
            .load::<SyncMetadataDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(SyncMetadata::try_from).collect()
    }
}
