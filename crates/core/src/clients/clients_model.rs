//! Client and service-visit domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time_utils::format_timestamp;

/// Status stored for a visit when the source omits one.
pub const UNKNOWN_SERVICE_STATUS: &str = "unknown";

const NOT_PROVIDED: &str = "not provided";

/// A service client, identified by the source system's `client_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Set by the source system when the record was extracted.
    pub extraction_date: Option<DateTime<Utc>>,
    /// Set locally on every merge. `None` until the record has been stored.
    pub last_sync: Option<DateTime<Utc>>,
}

impl Client {
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            email: None,
            phone: None,
            extraction_date: None,
            last_sync: None,
        }
    }

    /// Formats Brazilian-style numbers: 11 digits as `(AA) NNNNN-NNNN`,
    /// 10 digits as `(AA) NNNN-NNNN`. Anything else is returned unchanged.
    pub fn display_phone(&self) -> String {
        let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
            return NOT_PROVIDED.to_string();
        };

        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.len() {
            11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
            10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
            _ => phone.to_string(),
        }
    }

    pub fn display_email(&self) -> String {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(NOT_PROVIDED)
            .to_string()
    }
}

/// One completed visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// External key, when the source provides one. Takes precedence for merging.
    pub service_id: Option<String>,
    pub client_id: String,
    pub service_date: DateTime<Utc>,
    pub service_type: String,
    pub description: Option<String>,
    pub status: String,
    pub extraction_date: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl ServiceRecord {
    pub fn new(
        client_id: impl Into<String>,
        service_date: DateTime<Utc>,
        service_type: impl Into<String>,
    ) -> Self {
        Self {
            service_id: None,
            client_id: client_id.into(),
            service_date,
            service_type: service_type.into(),
            description: None,
            status: UNKNOWN_SERVICE_STATUS.to_string(),
            extraction_date: None,
            last_sync: None,
        }
    }

    /// Identity used to merge re-synced visits.
    ///
    /// `id:<service_id>` when an external key exists, otherwise
    /// `visit:<client_id>|<service_date>|<service_type>` with the date in
    /// canonical form, so equal instants written with different offsets collide.
    pub fn merge_key(&self) -> String {
        match self.service_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => format!("id:{}", id),
            _ => format!(
                "visit:{}|{}|{}",
                self.client_id,
                format_timestamp(&self.service_date),
                self.service_type
            ),
        }
    }
}
