use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::DashboardSummary;
use crate::stats;

pub fn build_report(
    scope: &str,
    today: NaiveDate,
    window_days: i64,
    summary: &DashboardSummary,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Hospital Dashboard Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (appointments since {})",
        scope,
        today,
        stats::window_start(today, window_days)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- {} appointments ({} today, {} upcoming)",
        summary.total_appointments, summary.appointments_today, summary.upcoming_appointments
    );
    let _ = writeln!(output, "- {} distinct patients", summary.distinct_patients);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Appointments This Week");
    for day in summary.weekly.iter() {
        let _ = writeln!(output, "- {}: {}", day.label, day.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");
    if summary.statuses.is_empty() {
        let _ = writeln!(output, "No appointments recorded.");
    } else {
        for status in summary.statuses.iter() {
            let name = if status.name.is_empty() {
                "(no status)"
            } else {
                status.name.as_str()
            };
            let _ = writeln!(
                output,
                "- {}: {} ({}%)",
                name, status.count, status.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Reasons");
    if summary.top_reasons.is_empty() {
        let _ = writeln!(output, "No visit reasons recorded.");
    } else {
        for reason in summary.top_reasons.iter() {
            let _ = writeln!(output, "- {}: {}", reason.label, reason.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Peak Hours");
    if summary.peak_hours.is_empty() {
        let _ = writeln!(output, "No appointment times recorded.");
    } else {
        for peak in summary.peak_hours.iter() {
            let _ = writeln!(
                output,
                "- {:02}:00 {} appointments ({})",
                peak.hour,
                peak.count,
                peak.tier.name()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Patient Ages");
    for bucket in summary.ages.iter() {
        let _ = writeln!(
            output,
            "- {}: {} ({}%)",
            bucket.range, bucket.count, bucket.percentage
        );
    }

    let ratings = &summary.ratings;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Patient Feedback");
    if ratings.total_comments == 0 {
        let _ = writeln!(output, "No rated feedback yet.");
    } else {
        let _ = writeln!(
            output,
            "- Doctor rating {:.1} / 5, overall {:.1} / 5 across {} reviews",
            ratings.average_doctor_rating, ratings.average_overall_rating, ratings.total_comments
        );
    }
    if ratings.pending_feedback > 0 {
        let _ = writeln!(
            output,
            "- {} visits awaiting feedback",
            ratings.pending_feedback
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::seed_snapshot;
    use crate::stats::{build_dashboard, DashboardOptions};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[test]
    fn report_covers_every_section() {
        let summary = build_dashboard(
            &seed_snapshot(today()),
            today(),
            &DashboardOptions::default(),
        );
        let report = build_report("all departments", today(), 7, &summary);

        assert!(report.starts_with("# Hospital Dashboard Report"));
        assert!(report.contains("Generated for all departments on 2026-10-15 (appointments since 2026-10-09)"));
        assert!(report.contains("- 12 appointments (2 today, 2 upcoming)"));
        assert!(report.contains("- Completed: 6 (50%)"));
        assert!(report.contains("- Follow-up: 4"));
        assert!(report.contains("- 09:00 4 appointments (High)"));
        assert!(report.contains("- 56+: 2 (33%)"));
        assert!(report.contains("- Doctor rating 4.0 / 5, overall 4.3 / 5 across 4 reviews"));
        assert!(report.contains("- 1 visits awaiting feedback"));
    }

    #[test]
    fn empty_dashboard_says_so() {
        let summary = build_dashboard(
            &Default::default(),
            today(),
            &DashboardOptions::default(),
        );
        let report = build_report("doctor d-1", today(), 7, &summary);

        assert!(report.contains("No appointments recorded."));
        assert!(report.contains("No visit reasons recorded."));
        assert!(report.contains("No appointment times recorded."));
        assert!(report.contains("- 0-18: 0 (0%)"));
        assert!(report.contains("No rated feedback yet."));
        assert!(!report.contains("awaiting feedback"));
    }
}
