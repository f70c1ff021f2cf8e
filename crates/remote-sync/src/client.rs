//! HTTP client for the sync server's incremental-fetch and health endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

use clientsync_core::clients::{Client, ServiceRecord};
use clientsync_core::sync::{DeltaPayload, RemoteSyncSource};
use clientsync_core::utils::time_utils::{format_timestamp, parse_timestamp};

use crate::error::{RemoteSyncError, Result};
use crate::types::{ApiErrorResponse, HealthResponse, SyncResponse};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const HEALTHY_STATUS: &str = "OK";

/// Single-attempt client for `GET /sync` and `GET /health`. Performs no retries.
#[derive(Debug, Clone)]
pub struct RemoteSyncClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteSyncClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[RemoteSync] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[RemoteSync] Response error ({}): {}", status, preview);
    }

    /// Create a new client with the default 30 second timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `http://192.168.1.100:3000/api`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| {
            RemoteSyncError::Config(format!("Invalid base URL '{}': {}", base_url, e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteSyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(RemoteSyncError::api(status.as_u16(), error.error));
            }
            return Err(RemoteSyncError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("[RemoteSync] Failed to deserialize response: {}", e);
            RemoteSyncError::from(e)
        })
    }

    /// Fetch records extracted after `since`, or everything when `None`.
    ///
    /// `since` travels as an encoded query parameter. Records at or before
    /// `since` are dropped even if the server returns them, and duplicates of
    /// the same client are ordered so the latest extraction is merged last.
    pub async fn fetch_delta(&self, since: Option<DateTime<Utc>>) -> Result<DeltaPayload> {
        let url = self.endpoint("sync");
        debug!("[RemoteSync] GET {} since={:?}", url, since);

        let mut request = self.client.get(&url);
        if let Some(since) = since {
            request = request.query(&[("since", format_timestamp(&since))]);
        }
        let response = request.send().await?;
        let payload: SyncResponse = Self::parse_response(response).await?;

        let sync_date = parse_timestamp(&payload.sync_date).ok_or_else(|| {
            RemoteSyncError::invalid_payload(format!("bad sync_date '{}'", payload.sync_date))
        })?;

        let mut clients = payload
            .clients
            .into_iter()
            .enumerate()
            .map(|(idx, c)| c.into_client(idx))
            .collect::<Result<Vec<Client>>>()?;
        let mut services = payload
            .services
            .into_iter()
            .enumerate()
            .map(|(idx, s)| s.into_service_record(idx))
            .collect::<Result<Vec<ServiceRecord>>>()?;

        if let Some(since) = since {
            let (before_clients, before_services) = (clients.len(), services.len());
            clients.retain(|c| c.extraction_date.map_or(true, |d| d > since));
            services.retain(|s| s.extraction_date.map_or(true, |d| d > since));
            let dropped = (before_clients - clients.len()) + (before_services - services.len());
            if dropped > 0 {
                warn!(
                    "[RemoteSync] Dropped {} records not newer than cursor {}",
                    dropped,
                    format_timestamp(&since)
                );
            }
        }

        // Stable sort: rows without an extraction date keep server order, first.
        clients.sort_by_key(|c| c.extraction_date);
        services.sort_by_key(|s| s.extraction_date);

        debug!(
            "[RemoteSync] Delta has {} clients and {} services (sync_date={})",
            clients.len(),
            services.len(),
            payload.sync_date
        );

        Ok(DeltaPayload {
            clients,
            services,
            sync_date,
        })
    }

    async fn fetch_health(&self) -> Result<HealthResponse> {
        let response = self.client.get(self.endpoint("health")).send().await?;
        Self::parse_response(response).await
    }

    /// Best-effort probe of `GET /health`. Never errors.
    pub async fn check_health(&self) -> bool {
        match self.fetch_health().await {
            Ok(health) => health.status == HEALTHY_STATUS,
            Err(err) => {
                debug!("[RemoteSync] Health check failed: {}", err);
                false
            }
        }
    }
}

#[async_trait]
impl RemoteSyncSource for RemoteSyncClient {
    async fn fetch_delta(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> clientsync_core::Result<DeltaPayload> {
        RemoteSyncClient::fetch_delta(self, since)
            .await
            .map_err(|err| {
                warn!(
                    "[RemoteSync] Delta fetch failed, class={:?}: {}",
                    err.retry_class(),
                    err
                );
                err.into()
            })
    }

    async fn check_health(&self) -> bool {
        RemoteSyncClient::check_health(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clientsync_core::Error as CoreError;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> RemoteSyncClient {
        RemoteSyncClient::with_timeout(&format!("{}/api/", server.url()), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = RemoteSyncClient::new("not a url").unwrap_err();
        assert!(matches!(err, RemoteSyncError::Config(_)));
    }

    #[tokio::test]
    async fn full_fetch_omits_since() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/sync")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"clients":[{"client_id":"c-1","name":"Ana","extraction_date":"2024-01-14T10:00:00Z"}],
                    "services":[{"client_id":"c-1","service_date":"2023-12-20","service_type":"Cleaning"}],
                    "sync_date":"2024-01-15T12:00:00Z"}"#,
            )
            .create_async()
            .await;

        let delta = client_for(&server).fetch_delta(None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(delta.clients.len(), 1);
        assert_eq!(delta.services[0].status, "unknown");
        assert_eq!(delta.sync_date, parse_timestamp("2024-01-15T12:00:00Z").unwrap());
    }

    #[tokio::test]
    async fn since_is_sent_as_encoded_query_parameter() {
        let mut server = Server::new_async().await;
        let since = parse_timestamp("2024-01-14T12:00:00Z").unwrap();
        let mock = server
            .mock("GET", "/api/sync")
            .match_query(Matcher::UrlEncoded(
                "since".into(),
                "2024-01-14T12:00:00.000Z".into(),
            ))
            .with_status(200)
            .with_body(r#"{"clients":[],"services":[],"sync_date":"2024-01-15T12:00:00Z"}"#)
            .create_async()
            .await;

        let delta = client_for(&server).fetch_delta(Some(since)).await.unwrap();

        mock.assert_async().await;
        assert!(delta.clients.is_empty());
    }

    #[tokio::test]
    async fn drops_records_not_newer_than_cursor_and_orders_by_extraction() {
        let mut server = Server::new_async().await;
        let since = parse_timestamp("2024-01-14T12:00:00Z").unwrap();
        server
            .mock("GET", "/api/sync")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"clients":[
                      {"client_id":"c-1","name":"Ana v3","extraction_date":"2024-01-15T09:00:00Z"},
                      {"client_id":"c-1","name":"Ana v1","extraction_date":"2024-01-14T12:00:00Z"},
                      {"client_id":"c-1","name":"Ana v2","extraction_date":"2024-01-15T08:00:00Z"}],
                    "sync_date":"2024-01-15T12:00:00Z"}"#,
            )
            .create_async()
            .await;

        let delta = client_for(&server).fetch_delta(Some(since)).await.unwrap();

        let names: Vec<&str> = delta.clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ana v2", "Ana v3"]);
    }

    #[tokio::test]
    async fn server_error_is_a_protocol_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/sync")
            .with_status(500)
            .with_body(r#"{"error":"Login failed for user 'sa'"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_delta(None).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));

        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Protocol(_)));
        assert!(core.to_string().contains("Login failed"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_protocol_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/sync")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let err: CoreError = client_for(&server).fetch_delta(None).await.unwrap_err().into();
        assert!(matches!(err, CoreError::Protocol(_)));
    }

    #[tokio::test]
    async fn invalid_record_fails_the_whole_delta() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/sync")
            .with_status(200)
            .with_body(
                r#"{"clients":[{"client_id":"c-1","name":"Ana"},{"client_id":"","name":"Ghost"}],
                    "sync_date":"2024-01-15T12:00:00Z"}"#,
            )
            .create_async()
            .await;

        let err = client_for(&server).fetch_delta(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload: client 1: missing client_id");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client =
            RemoteSyncClient::with_timeout("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();

        let err: CoreError = client.fetch_delta(None).await.unwrap_err().into();
        assert!(matches!(err, CoreError::Network(_)));
        assert!(!client.check_health().await);
    }

    #[tokio::test]
    async fn health_requires_ok_status() {
        let mut server = Server::new_async().await;
        let healthy = server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_body(r#"{"status":"OK","timestamp":"2024-01-15T12:00:00Z"}"#)
            .expect(1)
            .create_async()
            .await;
        assert!(client_for(&server).check_health().await);
        healthy.assert_async().await;
        healthy.remove_async().await;

        server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_body(r#"{"status":"DEGRADED"}"#)
            .create_async()
            .await;
        assert!(!client_for(&server).check_health().await);
    }

    #[tokio::test]
    async fn health_is_false_on_http_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/health")
            .with_status(503)
            .create_async()
            .await;
        assert!(!client_for(&server).check_health().await);
    }
}
