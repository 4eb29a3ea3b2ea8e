use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub staff_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub status: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
}

/// Patient feedback score. `Pending` means the patient has not rated yet
/// and the record never contributes to an average.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Rating {
    #[default]
    Pending,
    Submitted(f64),
}

impl Rating {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 5.0;

    /// Accepts scores on the 1..=5 star scale as sent. A zero star count is
    /// how the dashboards render "not rated yet", so it stays pending too.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(value) if (Self::MIN..=Self::MAX).contains(&value) => Rating::Submitted(value),
            _ => Rating::Pending,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Rating::Pending => None,
            Rating::Submitted(value) => Some(*value),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Rating::Pending)
    }
}

impl Serialize for Rating {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: Option<String>,
    pub doctor_rating: Rating,
    pub overall_rating: Rating,
    pub staff_rating: Rating,
    pub text: Option<String>,
    pub time: Option<NaiveDateTime>,
}

/// Everything one dashboard load fetched from the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub appointments: Vec<Appointment>,
    pub patients: Vec<Patient>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBucket {
    pub name: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeBucket {
    pub range: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_doctor_rating: f64,
    pub average_overall_rating: f64,
    pub total_comments: usize,
    pub pending_feedback: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            0 => Tier::High,
            1 => Tier::Medium,
            _ => Tier::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeakHour {
    pub hour: u32,
    pub count: usize,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_appointments: usize,
    pub appointments_today: usize,
    pub upcoming_appointments: usize,
    pub distinct_patients: usize,
    pub weekly: Vec<DayBucket>,
    pub statuses: Vec<StatusBucket>,
    pub top_reasons: Vec<LabelCount>,
    pub peak_hours: Vec<PeakHour>,
    pub ages: Vec<AgeBucket>,
    pub ratings: RatingSummary,
}
