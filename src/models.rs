use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An appointment as delivered by the Follow Up Boss API. Times stay in
/// their wire form (RFC 3339 strings); `crm::parse_appointment_time` turns
/// them into timestamps where needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, rename = "type")]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub outcome_id: Option<i64>,
    #[serde(default)]
    pub created_by_id: Option<i64>,
    #[serde(default)]
    pub invitees: Vec<Invitee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitee {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub person_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Catalog entry shared by the appointment-type and outcome-type listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
}

/// A locally recorded outcome that shadows the remote value for one
/// appointment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeOverride {
    pub appointment_id: i64,
    pub outcome_id: Option<i64>,
    pub outcome_name: String,
    pub note: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of an outcome bulk write (CSV import or upsert-many).
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeWrite {
    pub appointment_id: i64,
    pub outcome_id: i64,
    pub outcome_name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideStats {
    pub total: i64,
    pub unique_outcomes: i64,
    pub first_entry: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
}
