use std::fmt::Write;

use crate::metrics::MetricsReport;

pub fn build_report(metrics: &MetricsReport) -> String {
    let mut output = String::new();
    let summary = &metrics.summary;

    let _ = writeln!(output, "# Appointment Outcome Report");
    let _ = writeln!(
        output,
        "Generated for the {} dashboard ({} to {})",
        metrics.dashboard_type.label(),
        summary.date_range.start,
        summary.date_range.end
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Appointments: {}", summary.total_appointments);
    let _ = writeln!(
        output,
        "- With outcome: {}",
        summary.appointments_with_outcome
    );
    let _ = writeln!(
        output,
        "- Successful: {} ({}% rate)",
        metrics.outcome_categories.successful, summary.success_rate
    );
    let _ = writeln!(
        output,
        "- Nurture: {} ({}% rate)",
        metrics.outcome_categories.nurture, summary.nurture_rate
    );
    let _ = writeln!(
        output,
        "- Failed/Dead: {} ({}% rate)",
        metrics.outcome_categories.failed, summary.failed_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Appointment Type");

    if metrics.by_type.counts.is_empty() {
        let _ = writeln!(output, "No appointments recorded for this window.");
    } else {
        for (type_name, count) in metrics.by_type.counts.iter() {
            let share = metrics
                .by_type
                .percentages
                .get(type_name)
                .map(String::as_str)
                .unwrap_or("0.0");
            let _ = writeln!(output, "- {}: {} ({}%)", type_name, count, share);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Outcome");

    if metrics.by_outcome.counts.is_empty() {
        let _ = writeln!(output, "No appointments recorded for this window.");
    } else {
        for (outcome_name, count) in metrics.by_outcome.counts.iter() {
            let share = metrics
                .by_outcome
                .percentages
                .get(outcome_name)
                .map(String::as_str)
                .unwrap_or("0.0");
            let _ = writeln!(output, "- {}: {} ({}%)", outcome_name, count, share);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Agent");

    if metrics.by_agent.is_empty() {
        let _ = writeln!(output, "No agents with appointments in this window.");
    } else {
        for (agent_name, agent) in metrics.by_agent.iter() {
            let _ = writeln!(
                output,
                "- {}: {} appointments ({}% of period), {} successful / {} nurture / {} failed",
                agent_name,
                agent.total,
                agent.percentage,
                agent.categories.successful,
                agent.categories.nurture,
                agent.categories.failed
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{aggregate, DashboardType};
    use crate::models::{Appointment, User};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn listing_appointment(id: i64, outcome: &str) -> Appointment {
        Appointment {
            id,
            title: None,
            start: None,
            end: None,
            appointment_type: Some("Listing Appointment".to_string()),
            outcome: Some(outcome.to_string()),
            outcome_id: None,
            created_by_id: Some(12),
            invitees: Vec::new(),
        }
    }

    fn build(appointments: &[Appointment]) -> String {
        let users = vec![User {
            id: 12,
            name: "Jordan Ames".to_string(),
            email: None,
        }];
        let metrics = aggregate(
            appointments,
            &users,
            DashboardType::Sales,
            &HashSet::new(),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        );
        build_report(&metrics)
    }

    #[test]
    fn report_lists_breakdowns() {
        let report = build(&[
            listing_appointment(1, "Signed/Converted"),
            listing_appointment(2, "Canceled/No Show"),
        ]);

        assert!(report.contains("# Appointment Outcome Report"));
        assert!(report.contains("- Appointments: 2"));
        assert!(report.contains("- Listing Appointment: 2 (100.0%)"));
        assert!(report.contains("- Successful: 1 (50.0% rate)"));
        assert!(report.contains("Jordan Ames: 2 appointments (100.0% of period)"));
    }

    #[test]
    fn empty_window_renders_placeholders() {
        let report = build(&[]);
        assert!(report.contains("No appointments recorded for this window."));
        assert!(report.contains("No agents with appointments in this window."));
    }
}
