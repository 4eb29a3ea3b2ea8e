use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::{decode_records, parse_body, GatewayError, Resource, WireAppointment, WireId};
use crate::models::{Appointment, Comment, Patient, Rating, Snapshot};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Snapshot file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV import failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cannot encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{} has {invalid} of {total} records that do not validate; not rewriting it", path.display())]
    InvalidRecords {
        path: PathBuf,
        invalid: usize,
        total: usize,
    },
}

fn write_collection<T: Serialize>(
    dir: &Path,
    resource: Resource,
    records: &[T],
) -> Result<(), SnapshotError> {
    let path = dir.join(resource.file_name());
    let text = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, text).map_err(|source| SnapshotError::Io { path, source })
}

pub fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    std::fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    write_collection(dir, Resource::Appointments, &snapshot.appointments)?;
    write_collection(dir, Resource::Patients, &snapshot.patients)?;
    write_collection(dir, Resource::Comments, &snapshot.comments)?;
    Ok(())
}

fn read_appointments(dir: &Path) -> Result<Vec<Appointment>, SnapshotError> {
    let path = dir.join(Resource::Appointments.file_name());
    if !path.exists() {
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(&path).map_err(|source| SnapshotError::Io {
        path: path.clone(),
        source,
    })?;
    let raw = parse_body(Resource::Appointments, &text)?;
    let total = raw.len();
    let appointments = decode_records(Resource::Appointments, raw, WireAppointment::validate);

    // The file is rewritten on import, so anything dropped here would be lost.
    if appointments.len() < total {
        return Err(SnapshotError::InvalidRecords {
            path,
            invalid: total - appointments.len(),
            total,
        });
    }
    Ok(appointments)
}

/// Merges appointments from a CSV export into the snapshot directory.
/// Rows whose id is already present are skipped; rows without an id get one
/// derived from their content, so importing the same file twice is a no-op.
pub fn import_appointments_csv(csv_path: &Path, dir: &Path) -> Result<usize, SnapshotError> {
    #[derive(Deserialize)]
    struct CsvRow {
        id: Option<String>,
        patient_id: Option<String>,
        doctor_id: Option<String>,
        staff_id: Option<String>,
        date: Option<String>,
        time: Option<String>,
        status: Option<String>,
        reason: Option<String>,
    }

    std::fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut appointments = read_appointments(dir)?;
    let mut known: HashSet<String> = appointments
        .iter()
        .map(|appointment| appointment.id.clone())
        .collect();

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let id = row.id.unwrap_or_else(|| {
            let key = format!(
                "{}|{}|{}|{}|{}",
                row.patient_id.as_deref().unwrap_or_default(),
                row.doctor_id.as_deref().unwrap_or_default(),
                row.date.as_deref().unwrap_or_default(),
                row.time.as_deref().unwrap_or_default(),
                row.reason.as_deref().unwrap_or_default(),
            );
            format!("import-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()))
        });

        let wire = WireAppointment {
            id: Some(WireId::Text(id)),
            patient_id: row.patient_id.map(WireId::Text),
            doctor_id: row.doctor_id.map(WireId::Text),
            staff_id: row.staff_id.map(WireId::Text),
            date: row.date,
            time: row.time,
            status: row.status,
            reason: row.reason,
        };

        let Some(appointment) = wire.validate() else {
            tracing::warn!("Skipped CSV row with a blank id");
            continue;
        };
        if known.insert(appointment.id.clone()) {
            appointments.push(appointment);
            inserted += 1;
        }
    }

    write_collection(dir, Resource::Appointments, &appointments)?;
    tracing::info!(inserted, total = appointments.len(), "Imported appointments");
    Ok(inserted)
}

/// Demo records laid out around `today`: a week of history, a few upcoming
/// visits and a mix of rated and pending feedback.
pub fn seed_snapshot(today: NaiveDate) -> Snapshot {
    let patients = vec![
        ("p-1", "Avery", "Lee", 8, "F", "O+"),
        ("p-2", "Jules", "Moreno", 27, "M", "A+"),
        ("p-3", "Kiara", "Patel", 33, "F", "B-"),
        ("p-4", "Hassan", "Rahimi", 47, "M", "AB+"),
        ("p-5", "Mei", "Tanaka", 61, "F", "O-"),
        ("p-6", "Tomas", "Novak", 72, "M", "A-"),
    ]
    .into_iter()
    .map(|(id, first_name, last_name, age, gender, blood_group)| Patient {
        id: id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(today.year() - age, 3, 14),
        gender: Some(gender.to_string()),
        blood_group: Some(blood_group.to_string()),
    })
    .collect();

    let appointments = vec![
        ("a-01", "p-1", "d-100", 6, 9, "Completed", "Vaccination"),
        ("a-02", "p-2", "d-100", 5, 9, "Completed", "Back pain"),
        ("a-03", "p-3", "d-101", 5, 14, "Cancelled", "Follow-up"),
        ("a-04", "p-4", "d-100", 4, 10, "Completed", "Hypertension review"),
        ("a-05", "p-5", "d-101", 3, 9, "Completed", "Follow-up"),
        ("a-06", "p-6", "d-100", 2, 14, "Completed", "Chest pain"),
        ("a-07", "p-2", "d-101", 1, 11, "Approved", "Back pain"),
        ("a-08", "p-3", "d-100", 0, 9, "Scheduled", "Follow-up"),
        ("a-09", "p-4", "d-100", 0, 15, "Pending", "Lab results"),
        ("a-10", "p-5", "d-101", -1, 10, "Scheduled", "Follow-up"),
        ("a-11", "p-6", "d-100", -3, 14, "Pending", "Chest pain"),
        ("a-12", "p-1", "d-101", 12, 8, "Completed", "Vaccination"),
    ]
    .into_iter()
    .map(
        |(id, patient_id, doctor_id, days_ago, hour, status, reason)| Appointment {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            staff_id: Some("s-7".to_string()),
            date: Some(today - Duration::days(days_ago)),
            time: NaiveTime::from_hms_opt(hour, 30, 0),
            status: status.to_string(),
            reason: reason.to_string(),
        },
    )
    .collect();

    let comments = vec![
        ("c-1", "p-1", "d-100", "a-01", Some(5.0), Some(5.0), "Quick and friendly"),
        ("c-2", "p-2", "d-100", "a-02", Some(4.0), Some(4.0), "Helpful advice"),
        ("c-3", "p-4", "d-100", "a-04", Some(4.0), None, ""),
        ("c-4", "p-5", "d-101", "a-05", Some(3.0), Some(4.0), "Long wait"),
        ("c-5", "p-6", "d-100", "a-06", None, None, ""),
    ]
    .into_iter()
    .map(
        |(id, patient_id, doctor_id, appointment_id, doctor, overall, text)| Comment {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            appointment_id: Some(appointment_id.to_string()),
            doctor_rating: Rating::from_score(doctor),
            overall_rating: Rating::from_score(overall),
            staff_rating: Rating::Pending,
            text: (!text.is_empty()).then(|| text.to_string()),
            time: (today - Duration::days(1)).and_hms_opt(18, 0, 0),
        },
    )
    .collect();

    Snapshot {
        appointments,
        patients,
        comments,
    }
}

pub fn write_seed_snapshot(dir: &Path, today: NaiveDate) -> Result<Snapshot, SnapshotError> {
    let snapshot = seed_snapshot(today);
    write_snapshot(dir, &snapshot)?;
    Ok(snapshot)
}
