//! Expected-return arithmetic and classification.
//!
//! Everything here works on calendar dates, never on raw durations, so a
//! day is always one day regardless of DST.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clients::Client;
use crate::utils::time_utils::to_calendar_date;

pub const DEFAULT_DAYS_AFTER_SERVICE: i64 = 30;
pub const DEFAULT_WINDOW_DAYS_BEFORE: i64 = 7;
pub const DEFAULT_WINDOW_DAYS_AFTER: i64 = 14;

/// Largest positive delta still classified as due soon.
pub const DUE_SOON_MAX_DAYS: i64 = 7;

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    let shifted = Duration::try_days(days).and_then(|d| date.checked_add_signed(d));
    match shifted {
        Some(value) => value,
        None if days < 0 => NaiveDate::MIN,
        None => NaiveDate::MAX,
    }
}

/// `last_service_date + days_after_service` calendar days.
pub fn expected_return_date(last_service_date: NaiveDate, days_after_service: i64) -> NaiveDate {
    add_days(last_service_date, days_after_service)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnStatus {
    Overdue,
    DueToday,
    DueSoon,
    DueLater,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnClassification {
    pub status: ReturnStatus,
    /// Signed whole days from today to the expected date (negative = past).
    pub days_delta: i64,
}

impl ReturnClassification {
    pub fn magnitude(&self) -> i64 {
        self.days_delta.abs()
    }

    pub fn label(&self) -> String {
        let days = self.magnitude();
        let unit = if days == 1 { "day" } else { "days" };
        match self.status {
            ReturnStatus::Overdue => format!("overdue by {} {}", days, unit),
            ReturnStatus::DueToday => "due today".to_string(),
            ReturnStatus::DueSoon | ReturnStatus::DueLater => format!("due in {} {}", days, unit),
        }
    }
}

/// Classifies an expected return date against `today`.
pub fn classify(expected_return_date: NaiveDate, today: NaiveDate) -> ReturnClassification {
    let days_delta = expected_return_date.signed_duration_since(today).num_days();
    let status = match days_delta {
        d if d < 0 => ReturnStatus::Overdue,
        0 => ReturnStatus::DueToday,
        d if d <= DUE_SOON_MAX_DAYS => ReturnStatus::DueSoon,
        _ => ReturnStatus::DueLater,
    };
    ReturnClassification { status, days_delta }
}

/// Day range around "today" used to flag clients due for a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnWindow {
    /// Signed offset of the first day in the window (negative = past).
    pub start_offset_days: i64,
    /// Signed offset of the last day in the window, inclusive.
    pub end_offset_days: i64,
    pub days_after_service: i64,
}

impl Default for ReturnWindow {
    fn default() -> Self {
        Self {
            start_offset_days: -DEFAULT_WINDOW_DAYS_BEFORE,
            end_offset_days: DEFAULT_WINDOW_DAYS_AFTER,
            days_after_service: DEFAULT_DAYS_AFTER_SERVICE,
        }
    }
}

impl ReturnWindow {
    pub fn new(start_offset_days: i64, end_offset_days: i64, days_after_service: i64) -> Self {
        Self {
            start_offset_days,
            end_offset_days,
            days_after_service,
        }
    }

    /// Inclusive `(first, last)` dates of the window for `today`.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (
            add_days(today, self.start_offset_days),
            add_days(today, self.end_offset_days),
        )
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        let (first, last) = self.bounds(today);
        first <= date && date <= last
    }
}

/// A client with service history, projected onto its expected return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnCandidate {
    pub client: Client,
    pub last_service_date: DateTime<Utc>,
    pub expected_return_date: NaiveDate,
    pub classification: ReturnClassification,
}

impl ReturnCandidate {
    /// Projects a client's most recent visit; the window decides membership.
    pub fn evaluate(
        client: Client,
        last_service_date: DateTime<Utc>,
        window: &ReturnWindow,
        today: NaiveDate,
    ) -> Option<Self> {
        let expected = expected_return_date(
            to_calendar_date(&last_service_date),
            window.days_after_service,
        );
        if !window.contains(expected, today) {
            return None;
        }
        Some(Self {
            client,
            last_service_date,
            expected_return_date: expected,
            classification: classify(expected, today),
        })
    }
}
