//! Follow Up Boss API client.
//!
//! Listing endpoints are paginated with `limit`/`offset`; fetching stops on
//! an empty or short page. No automatic retry: a failed fetch surfaces to
//! the caller, and the dashboard offers a manual refresh instead.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{Appointment, CatalogEntry, User};

const DEFAULT_BASE_URL: &str = "https://api.followupboss.com/v1";
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 50;
const SYSTEM_NAME: &str = "FubAnalytics";
const SYSTEM_KEY: &str = "fub-analytics-dashboard";

#[derive(Debug, thiserror::Error)]
pub enum FubError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

pub struct FubClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FubClient {
    /// The API key is sent as the basic-auth username with an empty
    /// password, which is how Follow Up Boss authenticates system keys.
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
        }
    }

    /// All users (agents) on the account.
    pub async fn users(&self) -> Result<Vec<User>, FubError> {
        self.fetch_all_pages("/users", &[], |page: UsersPage| page.users)
            .await
    }

    /// Appointments within a date range, optionally limited to one agent.
    pub async fn appointments(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        user_id: Option<i64>,
    ) -> Result<Vec<Appointment>, FubError> {
        let mut params = vec![
            ("start".to_string(), start.to_string()),
            ("end".to_string(), end.to_string()),
        ];
        if let Some(id) = user_id {
            params.push(("userId".to_string(), id.to_string()));
        }
        self.fetch_all_pages("/appointments", &params, |page: AppointmentsPage| {
            page.appointments
        })
        .await
    }

    /// The account's appointment outcome catalog (dropdown options).
    pub async fn outcome_types(&self) -> Result<Vec<CatalogEntry>, FubError> {
        self.fetch_all_pages("/appointmentOutcomes", &[], |page: OutcomesPage| {
            page.appointment_outcomes
        })
        .await
    }

    /// The account's appointment type catalog.
    pub async fn appointment_types(&self) -> Result<Vec<CatalogEntry>, FubError> {
        self.fetch_all_pages("/appointmentTypes", &[], |page: TypesPage| {
            page.appointment_types
        })
        .await
    }

    async fn fetch_all_pages<P, T>(
        &self,
        path: &str,
        params: &[(String, String)],
        items: impl Fn(P) -> Vec<T>,
    ) -> Result<Vec<T>, FubError>
    where
        P: DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut offset = 0usize;

        for _ in 0..MAX_PAGES {
            let response = self
                .http
                .get(format!("{}{}", self.base_url, path))
                .basic_auth(&self.api_key, Some(""))
                .header("X-System", SYSTEM_NAME)
                .header("X-System-Key", SYSTEM_KEY)
                .query(params)
                .query(&[
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(FubError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let page: P = response.json().await?;
            let batch = items(page);
            let batch_len = batch.len();
            all.extend(batch);
            tracing::debug!(path, fetched = all.len(), "fetched page");

            if batch_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        tracing::debug!(path, total = all.len(), "listing complete");
        Ok(all)
    }
}

// Listing envelopes: each endpoint wraps its items in a key named after the
// collection, next to a `_metadata` block we do not read.

#[derive(Debug, Deserialize)]
struct UsersPage {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct AppointmentsPage {
    #[serde(default)]
    appointments: Vec<Appointment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomesPage {
    #[serde(default)]
    appointment_outcomes: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypesPage {
    #[serde(default)]
    appointment_types: Vec<CatalogEntry>,
}

/// Parse an appointment `start`/`end` value into a UTC timestamp.
///
/// Accepts full RFC 3339 datetimes and bare dates (all-day slots), which is
/// what the API delivers.
pub fn parse_appointment_time(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if s.contains('T') {
        DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00"))
            .or_else(|_| DateTime::parse_from_rfc3339(s))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn appointments_envelope_deserializes() {
        let json = r#"{
            "_metadata": {"collection": "appointments", "offset": 0, "limit": 100, "total": 2},
            "appointments": [
                {
                    "id": 101,
                    "title": "Listing presentation",
                    "start": "2026-03-02T14:00:00+00:00",
                    "end": "2026-03-02T15:00:00+00:00",
                    "type": "Listing Appointment",
                    "outcome": "Met- Signed/Converted",
                    "outcomeId": 4,
                    "createdById": 12,
                    "invitees": [
                        {"name": "Jordan Ames", "personId": 900},
                        {"name": "Sam Ortiz", "userId": 15}
                    ]
                },
                {
                    "id": 102,
                    "createdById": 12
                }
            ]
        }"#;

        let page: AppointmentsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.appointments.len(), 2);

        let first = &page.appointments[0];
        assert_eq!(first.appointment_type.as_deref(), Some("Listing Appointment"));
        assert_eq!(first.outcome_id, Some(4));
        assert_eq!(first.invitees[0].user_id, None);
        assert_eq!(first.invitees[1].user_id, Some(15));

        let bare = &page.appointments[1];
        assert!(bare.appointment_type.is_none());
        assert!(bare.outcome.is_none());
        assert!(bare.invitees.is_empty());
    }

    #[test]
    fn missing_collection_key_yields_empty_page() {
        let page: UsersPage = serde_json::from_str(r#"{"_metadata": {}}"#).unwrap();
        assert!(page.users.is_empty());
    }

    #[test]
    fn outcome_catalog_deserializes() {
        let json = r#"{"appointmentOutcomes": [
            {"id": 1, "name": "Met- Signed/Converted"},
            {"id": 2, "name": "Canceled/No Show"}
        ]}"#;
        let page: OutcomesPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.appointment_outcomes.len(), 2);
        assert_eq!(page.appointment_outcomes[1].name, "Canceled/No Show");
    }

    #[test]
    fn parses_rfc3339_times() {
        let dt = parse_appointment_time("2026-03-02T09:00:00-05:00").unwrap();
        assert_eq!(dt.hour(), 14);

        let dt = parse_appointment_time("2026-03-02T14:00:00Z").unwrap();
        assert_eq!(dt.hour(), 14);
    }

    #[test]
    fn parses_date_only_times() {
        let dt = parse_appointment_time("2026-03-02").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(
            dt.date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
    }

    #[test]
    fn empty_time_is_none() {
        assert!(parse_appointment_time("").is_none());
    }
}
