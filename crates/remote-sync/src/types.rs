//! Wire types for the sync server and their validation into domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use clientsync_core::clients::{Client, ServiceRecord, UNKNOWN_SERVICE_STATUS};
use clientsync_core::utils::time_utils::parse_timestamp;

use crate::error::{RemoteSyncError, Result};

/// Accepts `"42"`, `42` or `null`. Source ids come from SQL Server and are not
/// always serialized as strings.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `GET /sync` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub clients: Vec<RemoteClient>,
    #[serde(default)]
    pub services: Vec<RemoteService>,
    pub sync_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteClient {
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: Option<String>,
    #[serde(default)]
    pub extraction_date: Option<String>,
}

/// A visit row. The server's own `id` column is per extraction, not per visit,
/// so only an explicit `service_id` is treated as an external key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteService {
    #[serde(default, deserialize_with = "string_or_number")]
    pub service_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub service_date: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub extraction_date: Option<String>,
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: String,
}

fn optional_timestamp(value: Option<String>, what: &str) -> Result<Option<DateTime<Utc>>> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| RemoteSyncError::invalid_payload(format!("{}: bad timestamp '{}'", what, raw))),
    }
}

impl RemoteClient {
    pub fn into_client(self, index: usize) -> Result<Client> {
        let context = format!("client {}", index);
        let client_id = non_blank(self.client_id)
            .ok_or_else(|| RemoteSyncError::invalid_payload(format!("{}: missing client_id", context)))?;
        let name = non_blank(self.name).ok_or_else(|| {
            RemoteSyncError::invalid_payload(format!("{} ({}): missing name", context, client_id))
        })?;

        Ok(Client {
            extraction_date: optional_timestamp(self.extraction_date, &context)?,
            client_id,
            name,
            email: non_blank(self.email),
            phone: non_blank(self.phone),
            last_sync: None,
        })
    }
}

impl RemoteService {
    pub fn into_service_record(self, index: usize) -> Result<ServiceRecord> {
        let context = format!("service {}", index);
        let client_id = non_blank(self.client_id)
            .ok_or_else(|| RemoteSyncError::invalid_payload(format!("{}: missing client_id", context)))?;
        let service_date = optional_timestamp(self.service_date, &context)?.ok_or_else(|| {
            RemoteSyncError::invalid_payload(format!("{}: missing service_date", context))
        })?;
        let service_type = non_blank(self.service_type).ok_or_else(|| {
            RemoteSyncError::invalid_payload(format!("{}: missing service_type", context))
        })?;

        Ok(ServiceRecord {
            service_id: non_blank(self.service_id),
            client_id,
            service_date,
            service_type,
            description: non_blank(self.description),
            status: non_blank(self.status).unwrap_or_else(|| UNKNOWN_SERVICE_STATUS.to_string()),
            extraction_date: optional_timestamp(self.extraction_date, &context)?,
            last_sync: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sql_server_shaped_rows() {
        let json = r#"{
            "clients": [{"id": 7, "client_id": 1001, "name": "Ana", "email": null,
                         "phone": "11987654321", "extraction_date": "2024-01-14T10:00:00.000Z",
                         "created_at": "2024-01-14T10:00:01.000Z"}],
            "services": [{"id": 9, "client_id": "1001", "service_date": "20/12/2023",
                          "service_type": "Cleaning", "description": "", "status": null,
                          "extraction_date": "2024-01-14T10:00:00.000Z"}],
            "sync_date": "2024-01-15T12:00:00.000Z"
        }"#;
        let response: SyncResponse = serde_json::from_str(json).unwrap();

        let client = response.clients[0].clone().into_client(0).unwrap();
        assert_eq!(client.client_id, "1001");
        assert_eq!(client.email, None);

        let service = response.services[0].clone().into_service_record(0).unwrap();
        assert_eq!(service.service_id, None);
        assert_eq!(service.description, None);
        assert_eq!(service.status, "unknown");
        assert_eq!(
            service.service_date,
            parse_timestamp("2023-12-20").unwrap()
        );
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let response: SyncResponse =
            serde_json::from_str(r#"{"sync_date": "2024-01-15T12:00:00Z"}"#).unwrap();
        assert!(response.clients.is_empty());
        assert!(response.services.is_empty());
    }

    #[test]
    fn rejects_records_missing_identity() {
        let nameless = RemoteClient {
            client_id: Some("c-1".into()),
            name: Some("  ".into()),
            ..Default::default()
        };
        let err = nameless.into_client(2).unwrap_err();
        assert_eq!(err.to_string(), "Invalid payload: client 2 (c-1): missing name");

        let undated = RemoteService {
            client_id: Some("c-1".into()),
            service_type: Some("Cleaning".into()),
            ..Default::default()
        };
        assert!(undated.into_service_record(0).is_err());

        let bad_date = RemoteService {
            client_id: Some("c-1".into()),
            service_type: Some("Cleaning".into()),
            service_date: Some("last tuesday".into()),
            ..Default::default()
        };
        assert!(bad_date
            .into_service_record(4)
            .unwrap_err()
            .to_string()
            .contains("service 4: bad timestamp 'last tuesday'"));
    }
}
