//! Database models for clients and service visits.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use clientsync_core::clients::{Client, ServiceRecord};
use clientsync_core::errors::{DatabaseError, Error, Result};
use clientsync_core::utils::time_utils::{format_timestamp, parse_timestamp};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(client_id))]
#[diesel(table_name = crate::schema::clients)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct ClientDB {
    pub client_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub extraction_date: Option<String>,
    pub last_sync: String,
}

impl ClientDB {
    pub fn from_client(client: Client, last_sync: &str) -> Self {
        Self {
            client_id: client.client_id,
            name: client.name,
            email: client.email,
            phone: client.phone,
            extraction_date: client.extraction_date.as_ref().map(format_timestamp),
            last_sync: last_sync.to_string(),
        }
    }
}

impl TryFrom<ClientDB> for Client {
    type Error = Error;

    fn try_from(db: ClientDB) -> Result<Self> {
        Ok(Client {
            extraction_date: db
                .extraction_date
                .as_deref()
                .map(|v| stored_timestamp("clients.extraction_date", v))
                .transpose()?,
            last_sync: Some(stored_timestamp("clients.last_sync", &db.last_sync)?),
            client_id: db.client_id,
            name: db.name,
            email: db.email,
            phone: db.phone,
        })
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::services)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ServiceDB {
    pub id: i32,
    pub merge_key: String,
    pub service_id: Option<String>,
    pub client_id: String,
    pub service_date: String,
    pub service_type: String,
    pub description: Option<String>,
    pub status: String,
    pub extraction_date: Option<String>,
    pub last_sync: String,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::services)]
#[diesel(treat_none_as_null = true)]
pub struct NewServiceDB {
    pub merge_key: String,
    pub service_id: Option<String>,
    pub client_id: String,
    pub service_date: String,
    pub service_type: String,
    pub description: Option<String>,
    pub status: String,
    pub extraction_date: Option<String>,
    pub last_sync: String,
}

impl NewServiceDB {
    pub fn from_record(record: ServiceRecord, last_sync: &str) -> Self {
        Self {
            merge_key: record.merge_key(),
            service_id: record.service_id,
            client_id: record.client_id,
            service_date: format_timestamp(&record.service_date),
            service_type: record.service_type,
            description: record.description,
            status: record.status,
            extraction_date: record.extraction_date.as_ref().map(format_timestamp),
            last_sync: last_sync.to_string(),
        }
    }
}

impl TryFrom<ServiceDB> for ServiceRecord {
    type Error = Error;

    fn try_from(db: ServiceDB) -> Result<Self> {
        Ok(ServiceRecord {
            service_date: stored_timestamp("services.service_date", &db.service_date)?,
            extraction_date: db
                .extraction_date
                .as_deref()
                .map(|v| stored_timestamp("services.extraction_date", v))
                .transpose()?,
            last_sync: Some(stored_timestamp("services.last_sync", &db.last_sync)?),
            service_id: db.service_id,
            client_id: db.client_id,
            service_type: db.service_type,
            description: db.description,
            status: db.status,
        })
    }
}

/// Parses a timestamp column written by this crate.
pub(crate) fn stored_timestamp(column: &str, value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(value).ok_or_else(|| {
        Error::Database(DatabaseError::Internal(format!(
            "Corrupt timestamp in {}: '{}'",
            column, value
        )))
    })
}
