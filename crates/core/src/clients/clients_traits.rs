use async_trait::async_trait;
use chrono::NaiveDate;

use super::{Client, ServiceRecord};
use crate::errors::Result;
use crate::returns::{ReturnCandidate, ReturnWindow};

/// Local persistence for clients and their visits.
///
/// Writes are async because they are serialized through a single writer;
/// reads are synchronous and may run concurrently with each other and with
/// a write in flight, observing either the pre- or post-commit state.
#[async_trait]
pub trait ClientRepositoryTrait: Send + Sync {
    /// Inserts or replaces each client keyed by `client_id`, stamping
    /// `last_sync`. All-or-nothing: a failing record rolls back the whole batch
    /// and is reported through `Error::Persistence { index, .. }`.
    async fn upsert_clients(&self, clients: Vec<Client>) -> Result<usize>;

    /// Same contract as [`upsert_clients`](Self::upsert_clients), keyed by
    /// [`ServiceRecord::merge_key`].
    async fn upsert_service_records(&self, records: Vec<ServiceRecord>) -> Result<usize>;

    /// Clients whose expected return falls inside `window` relative to `today`,
    /// ordered by expected return date ascending. Clients without visits never
    /// appear.
    fn query_return_candidates(
        &self,
        window: &ReturnWindow,
        today: NaiveDate,
    ) -> Result<Vec<ReturnCandidate>>;

    /// All clients, ordered by name (byte-wise, case-sensitive).
    fn query_all_clients(&self) -> Result<Vec<Client>>;

    /// Visits of one client, newest first. Unknown clients yield an empty list.
    fn query_services_for_client(&self, client_id: &str) -> Result<Vec<ServiceRecord>>;

    fn count_clients(&self) -> Result<i64>;
}
