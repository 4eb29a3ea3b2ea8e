use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Timelike};

use crate::models::{
    AgeBucket, Appointment, Comment, DashboardSummary, DayBucket, LabelCount, Patient, PeakHour,
    RatingSummary, Snapshot, StatusBucket, Tier,
};

pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub const DEFAULT_AGE_BREAKPOINTS: [u32; 3] = [18, 35, 55];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekOrder {
    #[default]
    Canonical,
    // Seven days ending at the reference date, oldest first.
    Rolling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub window_days: i64,
    pub top: usize,
    pub age_breakpoints: Vec<u32>,
    pub week_order: WeekOrder,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            window_days: 7,
            top: 5,
            age_breakpoints: DEFAULT_AGE_BREAKPOINTS.to_vec(),
            week_order: WeekOrder::Canonical,
        }
    }
}

pub fn window_start(reference: NaiveDate, window_days: i64) -> NaiveDate {
    Duration::try_days(window_days.max(1) - 1)
        .and_then(|span| reference.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

pub fn in_window(date: NaiveDate, reference: NaiveDate, window_days: i64) -> bool {
    let days_ago = (reference - date).num_days();
    (0..window_days.max(1)).contains(&days_ago)
}

pub fn bucket_by_weekday(
    appointments: &[Appointment],
    reference: NaiveDate,
    window_days: i64,
    order: WeekOrder,
) -> Vec<DayBucket> {
    let mut counts = [0usize; 7];

    for appointment in appointments {
        let Some(date) = appointment.date else {
            continue;
        };
        if !in_window(date, reference, window_days) {
            continue;
        }
        counts[date.weekday().num_days_from_sunday() as usize] += 1;
    }

    let first = match order {
        WeekOrder::Canonical => 0,
        WeekOrder::Rolling => (reference.weekday().num_days_from_sunday() as usize + 1) % 7,
    };

    (0..7)
        .map(|offset| {
            let day = (first + offset) % 7;
            DayBucket {
                label: WEEKDAY_LABELS[day].to_string(),
                count: counts[day],
            }
        })
        .collect()
}

// First-seen order, labels verbatim.
pub fn tally<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<LabelCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<LabelCount> = Vec::new();

    for label in labels {
        match index.get(label) {
            Some(&position) => counts[position].count += 1,
            None => {
                index.insert(label, counts.len());
                counts.push(LabelCount {
                    label: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}

pub fn count_by_status(appointments: &[Appointment]) -> Vec<LabelCount> {
    tally(appointments.iter().map(|appointment| appointment.status.as_str()))
}

pub fn status_breakdown(appointments: &[Appointment]) -> Vec<StatusBucket> {
    let total = appointments.len();
    count_by_status(appointments)
        .into_iter()
        .map(|entry| StatusBucket {
            percentage: percentage(entry.count, total),
            name: entry.label,
            count: entry.count,
        })
        .collect()
}

pub fn top_n(items: &[LabelCount], n: usize) -> Vec<LabelCount> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));
    sorted.truncate(n);
    sorted
}

pub fn top_reasons(appointments: &[Appointment], n: usize) -> Vec<LabelCount> {
    let counts = tally(
        appointments
            .iter()
            .map(|appointment| appointment.reason.trim())
            .filter(|reason| !reason.is_empty()),
    );
    top_n(&counts, n)
}

pub fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (count as f64 * 100.0 / total as f64).round() as u32
    }
}

pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if date_of_birth > today {
        return None;
    }

    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AgeRange {
    low: u32,
    high: Option<u32>,
}

impl AgeRange {
    fn contains(&self, age: u32) -> bool {
        age >= self.low && self.high.map_or(true, |high| age <= high)
    }

    fn label(&self) -> String {
        match self.high {
            Some(high) => format!("{}-{}", self.low, high),
            None => format!("{}+", self.low),
        }
    }
}

fn age_ranges(breakpoints: &[u32]) -> Vec<AgeRange> {
    let mut sorted = breakpoints.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::with_capacity(sorted.len() + 1);
    let mut low = 0;
    for high in sorted {
        ranges.push(AgeRange {
            low,
            high: Some(high),
        });
        low = high.saturating_add(1);
    }
    ranges.push(AgeRange { low, high: None });
    ranges
}

/// `[18, 35, 55]` yields 0-18, 19-35, 36-55 and 56+.
pub fn age_distribution(
    patients: &[Patient],
    breakpoints: &[u32],
    today: NaiveDate,
) -> Vec<AgeBucket> {
    let ranges = age_ranges(breakpoints);
    let mut counts = vec![0usize; ranges.len()];

    for patient in patients {
        let Some(age) = patient
            .date_of_birth
            .and_then(|date_of_birth| age_in_years(date_of_birth, today))
        else {
            continue;
        };
        if let Some(position) = ranges.iter().position(|range| range.contains(age)) {
            counts[position] += 1;
        }
    }

    let total: usize = counts.iter().sum();
    ranges
        .iter()
        .zip(counts)
        .map(|(range, count)| AgeBucket {
            range: range.label(),
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn rating_summary(comments: &[Comment]) -> RatingSummary {
    let rated: Vec<&Comment> = comments
        .iter()
        .filter(|comment| !comment.doctor_rating.is_pending())
        .collect();

    RatingSummary {
        average_doctor_rating: round_one_decimal(mean(
            rated.iter().filter_map(|comment| comment.doctor_rating.value()),
        )),
        average_overall_rating: round_one_decimal(mean(
            rated.iter().filter_map(|comment| comment.overall_rating.value()),
        )),
        total_comments: rated.len(),
        pending_feedback: comments.len() - rated.len(),
    }
}

pub fn peak_hours(appointments: &[Appointment], top_k: usize) -> Vec<PeakHour> {
    let mut counts = [0usize; 24];
    for time in appointments.iter().filter_map(|appointment| appointment.time) {
        counts[time.hour() as usize] += 1;
    }

    let mut busy: Vec<(u32, usize)> = (0u32..)
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .collect();
    busy.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    busy.into_iter()
        .take(top_k)
        .enumerate()
        .map(|(rank, (hour, count))| PeakHour {
            hour,
            count,
            tier: Tier::for_rank(rank),
        })
        .collect()
}

pub fn build_dashboard(
    snapshot: &Snapshot,
    today: NaiveDate,
    options: &DashboardOptions,
) -> DashboardSummary {
    let appointments = &snapshot.appointments;
    let distinct_patients: HashSet<&str> = appointments
        .iter()
        .map(|appointment| appointment.patient_id.as_str())
        .collect();

    DashboardSummary {
        total_appointments: appointments.len(),
        appointments_today: appointments
            .iter()
            .filter(|appointment| appointment.date == Some(today))
            .count(),
        upcoming_appointments: appointments
            .iter()
            .filter(|appointment| appointment.date.is_some_and(|date| date > today))
            .count(),
        distinct_patients: distinct_patients.len(),
        weekly: bucket_by_weekday(appointments, today, options.window_days, options.week_order),
        statuses: status_breakdown(appointments),
        top_reasons: top_reasons(appointments, options.top),
        peak_hours: peak_hours(appointments, options.top),
        ages: age_distribution(&snapshot.patients, &options.age_breakpoints, today),
        ratings: rating_summary(&snapshot.comments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use chrono::NaiveTime;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn appointment(days_ago: i64, status: &str) -> Appointment {
        Appointment {
            id: format!("a-{days_ago}-{status}"),
            patient_id: "p-1".to_string(),
            doctor_id: "d-1".to_string(),
            staff_id: None,
            date: Some(today() - Duration::days(days_ago)),
            time: None,
            status: status.to_string(),
            reason: "Checkup".to_string(),
        }
    }

    fn at_hour(hour: u32) -> Appointment {
        Appointment {
            time: NaiveTime::from_hms_opt(hour, 30, 0),
            ..appointment(0, "Scheduled")
        }
    }

    fn patient_born(date_of_birth: Option<NaiveDate>) -> Patient {
        Patient {
            id: "p-1".to_string(),
            first_name: "Sara".to_string(),
            last_name: "Khan".to_string(),
            date_of_birth,
            gender: None,
            blood_group: None,
        }
    }

    fn comment(doctor: Rating, overall: Rating) -> Comment {
        Comment {
            id: "c-1".to_string(),
            patient_id: "p-1".to_string(),
            doctor_id: "d-1".to_string(),
            appointment_id: None,
            doctor_rating: doctor,
            overall_rating: overall,
            staff_rating: Rating::Pending,
            text: None,
            time: None,
        }
    }

    fn counts(items: &[LabelCount]) -> Vec<(&str, usize)> {
        items
            .iter()
            .map(|item| (item.label.as_str(), item.count))
            .collect()
    }

    #[test]
    fn weekly_window_keeps_recent_appointments_only() {
        let appointments = vec![
            appointment(0, "Completed"),
            appointment(1, "Cancelled"),
            appointment(10, "Completed"),
        ];

        let buckets = bucket_by_weekday(&appointments, today(), 7, WeekOrder::Canonical);
        let labels: Vec<&str> = buckets.iter().map(|bucket| bucket.label.as_str()).collect();
        assert_eq!(labels, WEEKDAY_LABELS.to_vec());
        assert_eq!(buckets.iter().map(|bucket| bucket.count).sum::<usize>(), 2);
        // 2026-10-15 is a Thursday.
        assert_eq!(buckets[4].count, 1);
        assert_eq!(buckets[3].count, 1);

        assert_eq!(
            counts(&count_by_status(&appointments)),
            vec![("Completed", 2), ("Cancelled", 1)]
        );
    }

    #[test]
    fn weekly_buckets_skip_undated_and_future_records() {
        let undated = Appointment {
            date: None,
            ..appointment(0, "Scheduled")
        };
        let future = appointment(-2, "Scheduled");
        let buckets = bucket_by_weekday(&[undated, future], today(), 7, WeekOrder::Canonical);
        assert!(buckets.iter().all(|bucket| bucket.count == 0));
    }

    #[test]
    fn rolling_order_ends_on_reference_day() {
        let buckets = bucket_by_weekday(&[], today(), 7, WeekOrder::Rolling);
        let labels: Vec<&str> = buckets.iter().map(|bucket| bucket.label.as_str()).collect();
        assert_eq!(labels, vec!["Fri", "Sat", "Sun", "Mon", "Tue", "Wed", "Thu"]);
    }

    #[test]
    fn window_start_covers_window_days() {
        assert_eq!(window_start(today(), 7), today() - Duration::days(6));
        assert!(in_window(window_start(today(), 7), today(), 7));
        assert!(!in_window(window_start(today(), 7) - Duration::days(1), today(), 7));
    }

    #[test]
    fn huge_windows_clamp_instead_of_overflowing() {
        assert_eq!(window_start(today(), 200_000_000), NaiveDate::MIN);
        assert_eq!(window_start(today(), i64::MAX), NaiveDate::MIN);
        assert_eq!(window_start(today(), 0), today());
        assert!(in_window(today() - Duration::days(5000), today(), i64::MAX));
    }

    #[test]
    fn status_counts_preserve_unknown_labels() {
        let appointments = vec![
            appointment(0, "Approved"),
            appointment(0, "Aproved"),
            appointment(0, ""),
            appointment(0, "Approved"),
        ];
        let tallied = count_by_status(&appointments);
        assert_eq!(
            counts(&tallied),
            vec![("Approved", 2), ("Aproved", 1), ("", 1)]
        );
        assert_eq!(
            tallied.iter().map(|entry| entry.count).sum::<usize>(),
            appointments.len()
        );
    }

    #[test]
    fn status_breakdown_percentages_sum_to_hundred() {
        let appointments = vec![
            appointment(0, "Completed"),
            appointment(0, "Completed"),
            appointment(0, "Cancelled"),
            appointment(0, "Pending"),
        ];
        let buckets = status_breakdown(&appointments);
        let percentages: Vec<u32> = buckets.iter().map(|bucket| bucket.percentage).collect();
        assert_eq!(percentages, vec![50, 25, 25]);
        assert!(status_breakdown(&[]).is_empty());
    }

    #[test]
    fn top_n_is_stable_bounded_and_idempotent() {
        let items = tally(["flu", "back pain", "flu", "checkup", "back pain", "rash"]);
        let top = top_n(&items, 3);
        assert_eq!(
            counts(&top),
            vec![("flu", 2), ("back pain", 2), ("checkup", 1)]
        );
        assert_eq!(top_n(&top, 3), top);
        assert!(top_n(&items, 0).is_empty());
        assert_eq!(top_n(&items, 10).len(), items.len());
    }

    #[test]
    fn top_reasons_ignore_blank_reasons() {
        let mut blank = appointment(0, "Scheduled");
        blank.reason = "   ".to_string();
        let mut fever = appointment(0, "Scheduled");
        fever.reason = " Fever ".to_string();
        let reasons = top_reasons(&[blank, fever, appointment(0, "Scheduled")], 5);
        assert_eq!(counts(&reasons), vec![("Fever", 1), ("Checkup", 1)]);
    }

    #[test]
    fn age_accounts_for_birthday_not_yet_reached() {
        let born = NaiveDate::from_ymd_opt(1990, 10, 16).unwrap();
        assert_eq!(age_in_years(born, today()), Some(35));
        let born = NaiveDate::from_ymd_opt(1990, 10, 15).unwrap();
        assert_eq!(age_in_years(born, today()), Some(36));
        let born = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert_eq!(age_in_years(born, today()), None);
    }

    #[test]
    fn age_distribution_buckets_by_breakpoints() {
        let patients = vec![
            patient_born(NaiveDate::from_ymd_opt(2006, 10, 15)),
            patient_born(NaiveDate::from_ymd_opt(1956, 10, 15)),
        ];
        let buckets = age_distribution(&patients, &[18, 35, 55], today());
        let summary: Vec<(&str, usize, u32)> = buckets
            .iter()
            .map(|bucket| (bucket.range.as_str(), bucket.count, bucket.percentage))
            .collect();
        assert_eq!(
            summary,
            vec![("0-18", 0, 0), ("19-35", 1, 50), ("36-55", 0, 0), ("56+", 1, 50)]
        );
    }

    #[test]
    fn age_distribution_of_nobody_is_all_zero() {
        let buckets = age_distribution(&[], &DEFAULT_AGE_BREAKPOINTS, today());
        assert_eq!(buckets.len(), 4);
        assert!(buckets
            .iter()
            .all(|bucket| bucket.count == 0 && bucket.percentage == 0));

        let unknown = age_distribution(&[patient_born(None)], &[55, 18, 35, 18], today());
        assert_eq!(unknown.len(), 4);
        assert_eq!(unknown[0].range, "0-18");
        assert!(unknown.iter().all(|bucket| bucket.percentage == 0));
    }

    #[test]
    fn rating_summary_skips_pending_feedback() {
        let comments = vec![
            comment(Rating::Submitted(5.0), Rating::Submitted(4.0)),
            comment(Rating::Submitted(4.0), Rating::Pending),
            comment(Rating::Submitted(4.0), Rating::Submitted(3.0)),
            comment(Rating::Pending, Rating::Submitted(1.0)),
        ];
        let summary = rating_summary(&comments);
        assert_eq!(summary.average_doctor_rating, 4.3);
        assert_eq!(summary.average_overall_rating, 3.5);
        assert_eq!(summary.total_comments, 3);
        assert_eq!(summary.pending_feedback, 1);
        assert!((1.0..=5.0).contains(&summary.average_doctor_rating));
    }

    #[test]
    fn rating_summary_averages_fractional_scores_as_sent() {
        let summary = rating_summary(&[
            comment(Rating::Submitted(4.5), Rating::Submitted(3.5)),
            comment(Rating::Submitted(4.5), Rating::Submitted(4.0)),
        ]);
        assert_eq!(summary.average_doctor_rating, 4.5);
        assert_eq!(summary.average_overall_rating, 3.8);
        assert_eq!(summary.total_comments, 2);

        let mixed = rating_summary(&[
            comment(Rating::from_score(Some(1.5)), Rating::Pending),
            comment(Rating::from_score(Some(5.0)), Rating::Pending),
        ]);
        assert_eq!(mixed.average_doctor_rating, 3.3);
        assert_eq!(mixed.total_comments, 2);
    }

    #[test]
    fn rating_summary_of_pending_only_is_zero() {
        let summary = rating_summary(&[comment(Rating::Pending, Rating::Pending)]);
        assert_eq!(summary.average_doctor_rating, 0.0);
        assert_eq!(summary.average_overall_rating, 0.0);
        assert_eq!(summary.total_comments, 0);
        assert_eq!(rating_summary(&[]).total_comments, 0);
    }

    #[test]
    fn peak_hours_rank_busiest_hours() {
        let mut appointments = Vec::new();
        appointments.extend((0..3).map(|_| at_hour(9)));
        appointments.extend((0..2).map(|_| at_hour(14)));
        appointments.push(at_hour(8));
        appointments.push(appointment(0, "Scheduled"));

        let peaks = peak_hours(&appointments, 2);
        assert_eq!(
            peaks,
            vec![
                PeakHour {
                    hour: 9,
                    count: 3,
                    tier: Tier::High
                },
                PeakHour {
                    hour: 14,
                    count: 2,
                    tier: Tier::Medium
                },
            ]
        );

        let all = peak_hours(&appointments, 5);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].tier, Tier::Low);
    }

    #[test]
    fn dashboard_combines_every_view() {
        let snapshot = Snapshot {
            appointments: vec![
                appointment(0, "Scheduled"),
                appointment(-3, "Scheduled"),
                Appointment {
                    patient_id: "p-2".to_string(),
                    ..appointment(2, "Completed")
                },
            ],
            patients: vec![patient_born(NaiveDate::from_ymd_opt(1980, 1, 1))],
            comments: vec![comment(Rating::Submitted(4.0), Rating::Submitted(4.0))],
        };

        let summary = build_dashboard(&snapshot, today(), &DashboardOptions::default());
        assert_eq!(summary.total_appointments, 3);
        assert_eq!(summary.appointments_today, 1);
        assert_eq!(summary.upcoming_appointments, 1);
        assert_eq!(summary.distinct_patients, 2);
        assert_eq!(summary.weekly.iter().map(|day| day.count).sum::<usize>(), 2);
        assert_eq!(summary.top_reasons[0].count, 3);
        assert_eq!(summary.ages[2].count, 1);
        assert_eq!(summary.ratings.average_doctor_rating, 4.0);
    }
}
