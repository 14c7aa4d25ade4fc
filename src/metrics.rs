//! Appointment metrics aggregation.
//!
//! Local outcome overrides are merged in before anything is counted, so
//! every breakdown reflects the locally recorded value when one exists.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Appointment, OutcomeOverride, User};

/// Outcome labels containing any of these (case-insensitive) count as
/// successful. Checked before the nurture list; first match wins.
pub const SUCCESSFUL_KEYWORDS: &[&str] = &["signed", "converted", "writing offer", "scholarship"];
pub const NURTURE_KEYWORDS: &[&str] = &["likely opportunity", "showed homes", "rescheduled"];

pub const SALES_APPOINTMENT_TYPES: &[&str] = &[
    "Listing Appointment",
    "Buyer Consultation",
    "Seller Consultation",
    "Scholarship Appointment",
];
pub const ISA_APPOINTMENT_TYPES: &[&str] = &["ISA Appointment", "Qualifying Call"];

pub const UNKNOWN_TYPE: &str = "Unknown";
pub const NO_OUTCOME: &str = "No Outcome";
pub const UNKNOWN_AGENT: &str = "Unknown Agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DashboardType {
    Sales,
    Isa,
}

impl DashboardType {
    pub fn allowed_types(self) -> &'static [&'static str] {
        match self {
            DashboardType::Sales => SALES_APPOINTMENT_TYPES,
            DashboardType::Isa => ISA_APPOINTMENT_TYPES,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DashboardType::Sales => "sales",
            DashboardType::Isa => "isa",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeCategory {
    Successful,
    Nurture,
    Failed,
}

/// Categorize an outcome label. Everything that matches neither keyword
/// list, including the empty label and "No Outcome", is failed.
pub fn categorize_outcome(label: &str) -> OutcomeCategory {
    let lowered = label.to_lowercase();
    if SUCCESSFUL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        OutcomeCategory::Successful
    } else if NURTURE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        OutcomeCategory::Nurture
    } else {
        OutcomeCategory::Failed
    }
}

/// Overwrite outcomes with local overrides, keyed by appointment id.
/// Returns how many appointments were touched.
pub fn merge_overrides(appointments: &mut [Appointment], overrides: &[OutcomeOverride]) -> usize {
    let by_id: HashMap<i64, &OutcomeOverride> =
        overrides.iter().map(|o| (o.appointment_id, o)).collect();

    let mut merged = 0usize;
    for appointment in appointments.iter_mut() {
        if let Some(local) = by_id.get(&appointment.id) {
            appointment.outcome = Some(local.outcome_name.clone());
            appointment.outcome_id = local.outcome_id;
            merged += 1;
        }
    }
    merged
}

/// The agent responsible for an appointment: the first invitee carrying a
/// user id, else whoever created it.
pub fn responsible_agent_id(appointment: &Appointment) -> Option<i64> {
    appointment
        .invitees
        .iter()
        .find_map(|invitee| invitee.user_id)
        .or(appointment.created_by_id)
}

/// Keep the appointments a dashboard view reports on. The ISA view also
/// requires the responsible agent to be in the designated ISA set.
pub fn filter_for_dashboard(
    appointments: &[Appointment],
    dashboard: DashboardType,
    isa_ids: &HashSet<i64>,
) -> Vec<Appointment> {
    appointments
        .iter()
        .filter(|appointment| {
            let type_name = appointment.appointment_type.as_deref().unwrap_or(UNKNOWN_TYPE);
            if !dashboard.allowed_types().contains(&type_name) {
                return false;
            }
            match dashboard {
                DashboardType::Sales => true,
                DashboardType::Isa => responsible_agent_id(appointment)
                    .map_or(false, |id| isa_ids.contains(&id)),
            }
        })
        .cloned()
        .collect()
}

/// Share of `total`, one decimal, as the wire format's string form.
pub fn percentage(count: usize, total: usize) -> String {
    if total == 0 {
        "0.0".to_string()
    } else {
        format!("{:.1}", count as f64 * 100.0 / total as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTotals {
    pub successful: usize,
    pub nurture: usize,
    pub failed: usize,
}

impl CategoryTotals {
    fn add(&mut self, category: OutcomeCategory) {
        match category {
            OutcomeCategory::Successful => self.successful += 1,
            OutcomeCategory::Nurture => self.nurture += 1,
            OutcomeCategory::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.nurture + self.failed
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountBreakdown {
    pub counts: BTreeMap<String, usize>,
    pub percentages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOutcomeBreakdown {
    pub total: usize,
    pub outcomes: BTreeMap<String, usize>,
    pub percentages: BTreeMap<String, String>,
    pub categories: CategoryTotals,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBreakdown {
    pub total: usize,
    pub percentage: String,
    pub by_type: BTreeMap<String, usize>,
    pub by_outcome: BTreeMap<String, usize>,
    pub categories: CategoryTotals,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_appointments: usize,
    pub appointments_with_outcome: usize,
    pub success_rate: String,
    pub nurture_rate: String,
    pub failed_rate: String,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsMetadata {
    pub appointment_types: Vec<String>,
    pub appointment_outcomes: Vec<String>,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub summary: MetricsSummary,
    pub outcome_categories: CategoryTotals,
    pub by_type: CountBreakdown,
    pub by_outcome: CountBreakdown,
    pub by_type_outcome: BTreeMap<String, TypeOutcomeBreakdown>,
    pub by_agent: BTreeMap<String, AgentBreakdown>,
    pub metadata: MetricsMetadata,
    pub dashboard_type: DashboardType,
    pub generated_at: String,
}

/// Aggregate a (merged) appointment list into the dashboard metrics object.
///
/// One counting pass over the filtered list, then a percentage pass over
/// every count bucket.
pub fn aggregate(
    appointments: &[Appointment],
    users: &[User],
    dashboard: DashboardType,
    isa_ids: &HashSet<i64>,
    start: NaiveDate,
    end: NaiveDate,
) -> MetricsReport {
    let filtered = filter_for_dashboard(appointments, dashboard, isa_ids);
    let user_names: HashMap<i64, &str> = users.iter().map(|u| (u.id, u.name.as_str())).collect();

    let total = filtered.len();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_outcome: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_type_outcome: BTreeMap<String, TypeOutcomeBreakdown> = BTreeMap::new();
    let mut by_agent: BTreeMap<String, AgentBreakdown> = BTreeMap::new();
    let mut categories = CategoryTotals::default();

    for appointment in &filtered {
        let type_name = appointment.appointment_type.as_deref().unwrap_or(UNKNOWN_TYPE);
        let outcome_name = appointment
            .outcome
            .as_deref()
            .filter(|o| !o.is_empty())
            .unwrap_or(NO_OUTCOME);
        let category = categorize_outcome(outcome_name);

        *by_type.entry(type_name.to_string()).or_insert(0) += 1;
        *by_outcome.entry(outcome_name.to_string()).or_insert(0) += 1;
        categories.add(category);

        let type_entry = by_type_outcome.entry(type_name.to_string()).or_default();
        type_entry.total += 1;
        *type_entry.outcomes.entry(outcome_name.to_string()).or_insert(0) += 1;
        type_entry.categories.add(category);

        let agent_name = responsible_agent_id(appointment)
            .and_then(|id| user_names.get(&id).copied())
            .unwrap_or(UNKNOWN_AGENT);
        let agent_entry = by_agent.entry(agent_name.to_string()).or_default();
        agent_entry.total += 1;
        *agent_entry.by_type.entry(type_name.to_string()).or_insert(0) += 1;
        *agent_entry
            .by_outcome
            .entry(outcome_name.to_string())
            .or_insert(0) += 1;
        agent_entry.categories.add(category);
    }

    let type_percentages: BTreeMap<String, String> = by_type
        .iter()
        .map(|(name, &count)| (name.clone(), percentage(count, total)))
        .collect();
    let outcome_percentages: BTreeMap<String, String> = by_outcome
        .iter()
        .map(|(name, &count)| (name.clone(), percentage(count, total)))
        .collect();

    for entry in by_type_outcome.values_mut() {
        entry.percentages = entry
            .outcomes
            .iter()
            .map(|(name, &count)| (name.clone(), percentage(count, entry.total)))
            .collect();
    }
    for agent in by_agent.values_mut() {
        agent.percentage = percentage(agent.total, total);
    }

    let appointment_types: Vec<String> = by_type.keys().cloned().collect();
    let appointment_outcomes: Vec<String> = by_outcome.keys().cloned().collect();
    let with_outcome = total - by_outcome.get(NO_OUTCOME).copied().unwrap_or(0);

    MetricsReport {
        summary: MetricsSummary {
            total_appointments: total,
            appointments_with_outcome: with_outcome,
            success_rate: percentage(categories.successful, total),
            nurture_rate: percentage(categories.nurture, total),
            failed_rate: percentage(categories.failed, total),
            date_range: DateRange { start, end },
        },
        outcome_categories: categories,
        by_type: CountBreakdown {
            counts: by_type,
            percentages: type_percentages,
        },
        by_outcome: CountBreakdown {
            counts: by_outcome,
            percentages: outcome_percentages,
        },
        by_type_outcome,
        by_agent,
        metadata: MetricsMetadata {
            appointment_types,
            appointment_outcomes,
            users: users
                .iter()
                .map(|u| UserSummary {
                    id: u.id,
                    name: u.name.clone(),
                    email: u.email.clone(),
                })
                .collect(),
        },
        dashboard_type: dashboard,
        generated_at: Utc::now().to_rfc3339(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeChange {
    pub absolute: i64,
    pub percentage: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateChange {
    pub absolute: String,
    pub period1: String,
    pub period2: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonChanges {
    pub appointments: VolumeChange,
    pub success_rate: RateChange,
    pub nurture_rate: RateChange,
    pub failed_rate: RateChange,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsComparison {
    pub period1: MetricsReport,
    pub period2: MetricsReport,
    pub changes: ComparisonChanges,
    pub generated_at: String,
}

fn rate_change(period1: &str, period2: &str) -> RateChange {
    let before = period1.parse::<f64>().unwrap_or(0.0);
    let after = period2.parse::<f64>().unwrap_or(0.0);
    RateChange {
        absolute: format!("{:.1}", after - before),
        period1: period1.to_string(),
        period2: period2.to_string(),
    }
}

/// Compare two aggregated periods: volume change plus deltas for each
/// category rate.
pub fn compare(period1: MetricsReport, period2: MetricsReport) -> MetricsComparison {
    let before = period1.summary.total_appointments as i64;
    let after = period2.summary.total_appointments as i64;

    let appointments = VolumeChange {
        absolute: after - before,
        percentage: if before > 0 {
            format!("{:.1}", (after - before) as f64 * 100.0 / before as f64)
        } else {
            "0.0".to_string()
        },
    };

    let changes = ComparisonChanges {
        appointments,
        success_rate: rate_change(&period1.summary.success_rate, &period2.summary.success_rate),
        nurture_rate: rate_change(&period1.summary.nurture_rate, &period2.summary.nurture_rate),
        failed_rate: rate_change(&period1.summary.failed_rate, &period2.summary.failed_rate),
    };

    MetricsComparison {
        period1,
        period2,
        changes,
        generated_at: Utc::now().to_rfc3339(),
    }
}
