use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Appointment, Comment, Patient, Rating, Snapshot};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Appointments,
    Patients,
    Comments,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Appointments => "appointments",
            Resource::Patients => "patients",
            Resource::Comments => "comments",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Resource::Appointments => "appointments.json",
            Resource::Patients => "patients.json",
            Resource::Comments => "comments.json",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Cannot reach backend at {0}")]
    Connection(String),

    #[error("Request for {resource} timed out after {seconds}s")]
    Timeout { resource: Resource, seconds: u64 },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Backend returned {status} for {resource}: {body}")]
    Status {
        resource: Resource,
        status: u16,
        body: String,
    },

    #[error("Malformed {resource} payload: {message}")]
    Decode { resource: Resource, message: String },

    #[error("Snapshot file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait Gateway {
    fn fetch_records(
        &self,
        resource: Resource,
    ) -> impl Future<Output = Result<Vec<Value>, GatewayError>> + Send;
}

/// Accepts either a bare array or an object wrapping the array in `data`.
pub fn records_from_body(resource: Resource, body: Value) -> Result<Vec<Value>, GatewayError> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(GatewayError::Decode {
                resource,
                message: "expected an array or an object with a `data` array".to_string(),
            }),
        },
        other => Err(GatewayError::Decode {
            resource,
            message: format!("expected an array, got {other}"),
        }),
    }
}

pub fn parse_body(resource: Resource, text: &str) -> Result<Vec<Value>, GatewayError> {
    let body: Value = serde_json::from_str(text).map_err(|e| GatewayError::Decode {
        resource,
        message: e.to_string(),
    })?;
    records_from_body(resource, body)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_string(self) -> Option<String> {
        let id = match self {
            WireId::Text(text) => text.trim().to_string(),
            WireId::Number(number) => number.to_string(),
        };
        (!id.is_empty()).then_some(id)
    }
}

fn id_or_empty(id: Option<WireId>) -> String {
    id.and_then(WireId::into_string).unwrap_or_default()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(value).map(|datetime| datetime.date()))
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    ["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|datetime| datetime.naive_utc())
        .ok()
        .or_else(|| {
            [
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%d %H:%M:%S%.f",
            ]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAppointment {
    #[serde(alias = "_id")]
    pub id: Option<WireId>,
    pub patient_id: Option<WireId>,
    pub doctor_id: Option<WireId>,
    pub staff_id: Option<WireId>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "purpose")]
    pub reason: Option<String>,
}

impl WireAppointment {
    pub fn validate(self) -> Option<Appointment> {
        let id = self.id.and_then(WireId::into_string)?;
        Some(Appointment {
            id,
            patient_id: id_or_empty(self.patient_id),
            doctor_id: id_or_empty(self.doctor_id),
            staff_id: self.staff_id.and_then(WireId::into_string),
            date: self.date.as_deref().and_then(parse_date),
            time: self.time.as_deref().and_then(parse_time),
            status: self.status.unwrap_or_default(),
            reason: self.reason.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePatient {
    #[serde(alias = "_id")]
    pub id: Option<WireId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(alias = "dob")]
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
}

impl WirePatient {
    pub fn validate(self) -> Option<Patient> {
        let id = self.id.and_then(WireId::into_string)?;
        Some(Patient {
            id,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            date_of_birth: self.date_of_birth.as_deref().and_then(parse_date),
            gender: self.gender,
            blood_group: self.blood_group,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireComment {
    #[serde(alias = "_id")]
    pub id: Option<WireId>,
    pub patient_id: Option<WireId>,
    pub doctor_id: Option<WireId>,
    pub appointment_id: Option<WireId>,
    pub doctor_rating: Option<f64>,
    pub overall_rating: Option<f64>,
    pub staff_rating: Option<f64>,
    #[serde(alias = "text")]
    pub comment_text: Option<String>,
    pub time: Option<String>,
}

fn rating(comment_id: &str, field: &'static str, score: Option<f64>) -> Rating {
    let rating = Rating::from_score(score);
    if let (Rating::Pending, Some(value)) = (rating, score) {
        if value != 0.0 {
            tracing::warn!(comment_id, field, value, "Rating outside 1-5 treated as pending");
        }
    }
    rating
}

impl WireComment {
    pub fn validate(self) -> Option<Comment> {
        let id = self.id.and_then(WireId::into_string)?;
        Some(Comment {
            patient_id: id_or_empty(self.patient_id),
            doctor_id: id_or_empty(self.doctor_id),
            appointment_id: self.appointment_id.and_then(WireId::into_string),
            doctor_rating: rating(&id, "doctorRating", self.doctor_rating),
            overall_rating: rating(&id, "overallRating", self.overall_rating),
            staff_rating: rating(&id, "staffRating", self.staff_rating),
            text: self.comment_text.filter(|text| !text.trim().is_empty()),
            time: self.time.as_deref().and_then(parse_datetime),
            id,
        })
    }
}

pub fn decode_records<W, T>(
    resource: Resource,
    raw: Vec<Value>,
    validate: fn(W) -> Option<T>,
) -> Vec<T>
where
    W: DeserializeOwned,
{
    let total = raw.len();
    let mut records = Vec::with_capacity(total);

    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<W>(value) {
            Ok(wire) => match validate(wire) {
                Some(record) => records.push(record),
                None => tracing::warn!(%resource, index, "Dropped record without an id"),
            },
            Err(e) => tracing::warn!(%resource, index, error = %e, "Dropped malformed record"),
        }
    }

    if records.len() < total {
        tracing::info!(%resource, kept = records.len(), total, "Some records were dropped");
    }
    records
}

pub async fn fetch_appointments<G: Gateway>(gateway: &G) -> Result<Vec<Appointment>, GatewayError> {
    let raw = gateway.fetch_records(Resource::Appointments).await?;
    Ok(decode_records(
        Resource::Appointments,
        raw,
        WireAppointment::validate,
    ))
}

pub async fn fetch_patients<G: Gateway>(gateway: &G) -> Result<Vec<Patient>, GatewayError> {
    let raw = gateway.fetch_records(Resource::Patients).await?;
    Ok(decode_records(Resource::Patients, raw, WirePatient::validate))
}

pub async fn fetch_comments<G: Gateway>(gateway: &G) -> Result<Vec<Comment>, GatewayError> {
    let raw = gateway.fetch_records(Resource::Comments).await?;
    Ok(decode_records(Resource::Comments, raw, WireComment::validate))
}

// Any failure fails the whole load.
pub async fn load_snapshot<G: Gateway>(gateway: &G) -> Result<Snapshot, GatewayError> {
    let (appointments, patients, comments) = tokio::try_join!(
        fetch_appointments(gateway),
        fetch_patients(gateway),
        fetch_comments(gateway),
    )?;

    tracing::info!(
        appointments = appointments.len(),
        patients = patients.len(),
        comments = comments.len(),
        "Dashboard snapshot loaded"
    );

    Ok(Snapshot {
        appointments,
        patients,
        comments,
    })
}

pub struct RestGateway {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
    timeout_secs: u64,
}

impl RestGateway {
    pub fn new(base_url: &str, timeout_secs: u64, session: &Session) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: session.token().map(str::to_string),
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_error(&self, resource: Resource, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                resource,
                seconds: self.timeout_secs,
            }
        } else if e.is_connect() {
            GatewayError::Connection(self.base_url.clone())
        } else {
            GatewayError::Http(e.to_string())
        }
    }
}

impl Gateway for RestGateway {
    async fn fetch_records(&self, resource: Resource) -> Result<Vec<Value>, GatewayError> {
        let url = format!("{}/{}", self.base_url, resource.path());
        tracing::debug!(url = %url, "Fetching records");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(resource, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                resource,
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.request_error(resource, e))?;
        parse_body(resource, &text)
    }
}

pub struct SnapshotGateway {
    dir: PathBuf,
}

impl SnapshotGateway {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl Gateway for SnapshotGateway {
    async fn fetch_records(&self, resource: Resource) -> Result<Vec<Value>, GatewayError> {
        let path = self.dir.join(resource.file_name());
        tracing::debug!(path = %path.display(), "Reading snapshot file");

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| GatewayError::Io { path, source })?;
        parse_body(resource, &text)
    }
}
