//! Database models for the sync attempt log.

use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use clientsync_core::errors::Error;
use clientsync_core::sync::{NewSyncMetadata, SyncMetadata, SyncStatus};
use clientsync_core::utils::time_utils::format_timestamp;

use crate::clients::model::stored_timestamp;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::sync_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncMetadataDB {
    pub id: i32,
    pub last_sync_date: String,
    pub sync_status: String,
    pub cursor: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::sync_metadata)]
pub struct NewSyncMetadataDB {
    pub last_sync_date: String,
    pub sync_status: String,
    pub cursor: Option<String>,
    pub error_message: Option<String>,
}

impl NewSyncMetadataDB {
    pub fn stamped(entry: NewSyncMetadata, last_sync_date: &str) -> Self {
        Self {
            last_sync_date: last_sync_date.to_string(),
            sync_status: entry.sync_status.as_str().to_string(),
            cursor: entry.cursor.as_ref().map(format_timestamp),
            error_message: entry.error_message,
        }
    }
}

impl TryFrom<SyncMetadataDB> for SyncMetadata {
    type Error = Error;

    fn try_from(db: SyncMetadataDB) -> Result<Self, Self::Error> {
        Ok(SyncMetadata {
            id: i64::from(db.id),
            last_sync_date: stored_timestamp("sync_metadata.last_sync_date", &db.last_sync_date)?,
            sync_status: SyncStatus::from_str(&db.sync_status)?,
            cursor: db
                .cursor
                .as_deref()
                .map(|v| stored_timestamp("sync_metadata.cursor", v))
                .transpose()?,
            error_message: db.error_message,
        })
    }
}
