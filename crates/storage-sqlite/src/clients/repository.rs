use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::{debug, info};

use clientsync_core::clients::{Client, ClientRepositoryTrait, ServiceRecord};
use clientsync_core::errors::{Error, Result};
use clientsync_core::returns::{ReturnCandidate, ReturnWindow};
use clientsync_core::utils::time_utils::format_timestamp;

use super::model::{stored_timestamp, ClientDB, NewServiceDB, ServiceDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{clients, services};

pub struct ClientRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ClientRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        ClientRepository { pool, writer }
    }

    fn latest_service_dates(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = services::table
            .group_by(services::client_id)
            .select((services::client_id, max(services::service_date)))
            .load::<(String, Option<String>)>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    /// Clients with at least one stored visit. The membership test is a
    /// subquery, so no bind parameter is spent per client.
    fn load_served_clients(&self) -> Result<HashMap<String, Client>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = clients::table
            .filter(clients::client_id.eq_any(services::table.select(services::client_id)))
            .select(ClientDB::as_select())
            .load::<ClientDB>(&mut conn)
            .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|row| Client::try_from(row).map(|c| (c.client_id.clone(), c)))
            .collect()
    }
}

fn require(index: usize, value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::persistence_at(index, format!("missing {}", what)));
    }
    Ok(())
}

#[async_trait]
impl ClientRepositoryTrait for ClientRepository {
    async fn upsert_clients(&self, records: Vec<Client>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let merged = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let now = format_timestamp(&Utc::now());
                let total = records.len();
                for (idx, client) in records.into_iter().enumerate() {
                    require(idx, &client.client_id, "client_id")?;
                    require(idx, &client.name, "name")?;

                    let row = ClientDB::from_client(client, &now);
                    diesel::insert_into(clients::table)
                        .values(&row)
                        .on_conflict(clients::client_id)
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(|e| {
                            Error::persistence_at(
                                idx,
                                format!("client '{}': {}", row.client_id, e),
                            )
                        })?;
                }
                Ok(total)
            })
            .await?;

        info!("[LocalStore] Merged {} clients", merged);
        Ok(merged)
    }

    async fn upsert_service_records(&self, records: Vec<ServiceRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let merged = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let now = format_timestamp(&Utc::now());
                let total = records.len();
                for (idx, record) in records.into_iter().enumerate() {
                    require(idx, &record.client_id, "client_id")?;
                    require(idx, &record.service_type, "service_type")?;

                    let row = NewServiceDB::from_record(record, &now);
                    diesel::insert_into(services::table)
                        .values(&row)
                        .on_conflict(services::merge_key)
                        .do_update()
                        .set(&row)
                        .execute(conn)
                        .map_err(|e| {
                            Error::persistence_at(
                                idx,
                                format!("service '{}': {}", row.merge_key, e),
                            )
                        })?;
                }
                Ok(total)
            })
            .await?;

        info!("[LocalStore] Merged {} service records", merged);
        Ok(merged)
    }

    fn query_return_candidates(
        &self,
        window: &ReturnWindow,
        today: NaiveDate,
    ) -> Result<Vec<ReturnCandidate>> {
        let latest = self.latest_service_dates()?;
        let mut clients_by_id = self.load_served_clients()?;

        let mut candidates = Vec::new();
        for (client_id, last_service) in latest {
            let Some(last_service) = last_service else {
                continue;
            };
            // Visits whose client has not been synced yet.
            let Some(client) = clients_by_id.remove(&client_id) else {
                continue;
            };
            let last_service = stored_timestamp("services.service_date", &last_service)?;
            if let Some(candidate) = ReturnCandidate::evaluate(client, last_service, window, today)
            {
                candidates.push(candidate);
            }
        }

        candidates.sort_by(|a, b| {
            a.expected_return_date
                .cmp(&b.expected_return_date)
                .then_with(|| a.client.name.cmp(&b.client.name))
                .then_with(|| a.client.client_id.cmp(&b.client.client_id))
        });

        debug!(
            "[LocalStore] {} return candidates for {} in {:?}",
            candidates.len(),
            today,
            window.bounds(today)
        );
        Ok(candidates)
    }

    fn query_all_clients(&self) -> Result<Vec<Client>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = clients::table
            .order((clients::name.asc(), clients::client_id.asc()))
            .select(ClientDB::as_select())
            .load::<ClientDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(Client::try_from).collect()
    }

    fn query_services_for_client(&self, client_id: &str) -> Result<Vec<ServiceRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = services::table
            .filter(services::client_id.eq(client_id))
            .order((services::service_date.desc(), services::id.desc()))
            .select(ServiceDB::as_select())
            .load::<ServiceDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(ServiceRecord::try_from).collect()
    }

    fn count_clients(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = clients::table
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }
}
