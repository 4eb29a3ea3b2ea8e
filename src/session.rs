use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::Snapshot;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown role: '{0}'. Must be one of: doctor, staff, manager, customer")]
    UnknownRole(String),

    #[error("Role {0} requires a user id")]
    MissingUserId(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Doctor,
    Staff,
    Manager,
    Customer,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Customer => "customer",
        }
    }

    /// Staff and managers see the whole hospital.
    pub fn sees_everything(&self) -> bool {
        matches!(self, Role::Staff | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "staff" => Ok(Role::Staff),
            "manager" | "admin" => Ok(Role::Manager),
            "customer" | "patient" => Ok(Role::Customer),
            _ => Err(SessionError::UnknownRole(value.to_string())),
        }
    }
}

/// Authentication context for one dashboard run. Created once at login and
/// handed to everything that needs to know who is asking.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    role: Role,
    user_id: Option<String>,
    token: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Session {
    pub fn login(
        role: Role,
        user_id: Option<String>,
        token: Option<String>,
    ) -> Result<Self, SessionError> {
        let user_id = user_id.filter(|id| !id.trim().is_empty());
        if !role.sees_everything() && user_id.is_none() {
            return Err(SessionError::MissingUserId(role));
        }

        tracing::debug!(role = %role, user_id = ?user_id, "Session opened");
        Ok(Self {
            role,
            user_id,
            token: token.filter(|token| !token.is_empty()),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Label used in report headers.
    pub fn scope_label(&self) -> String {
        match (self.role.sees_everything(), self.user_id()) {
            (false, Some(id)) => format!("{} {}", self.role, id),
            _ => "all departments".to_string(),
        }
    }

    /// Narrows a snapshot to the records this session may see.
    pub fn scope(&self, snapshot: Snapshot) -> Snapshot {
        let Some(user_id) = self.user_id().filter(|_| !self.role.sees_everything()) else {
            return snapshot;
        };

        match self.role {
            Role::Doctor => {
                let appointments: Vec<_> = snapshot
                    .appointments
                    .into_iter()
                    .filter(|appointment| appointment.doctor_id == user_id)
                    .collect();
                let patients = snapshot
                    .patients
                    .into_iter()
                    .filter(|patient| {
                        appointments
                            .iter()
                            .any(|appointment| appointment.patient_id == patient.id)
                    })
                    .collect();
                let comments = snapshot
                    .comments
                    .into_iter()
                    .filter(|comment| comment.doctor_id == user_id)
                    .collect();
                Snapshot {
                    appointments,
                    patients,
                    comments,
                }
            }
            Role::Customer => Snapshot {
                appointments: snapshot
                    .appointments
                    .into_iter()
                    .filter(|appointment| appointment.patient_id == user_id)
                    .collect(),
                patients: snapshot
                    .patients
                    .into_iter()
                    .filter(|patient| patient.id == user_id)
                    .collect(),
                comments: snapshot
                    .comments
                    .into_iter()
                    .filter(|comment| comment.patient_id == user_id)
                    .collect(),
            },
            Role::Staff | Role::Manager => snapshot,
        }
    }

    /// Ends the session. The token is dropped with it.
    pub fn logout(self) {
        tracing::debug!(role = %self.role, "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Appointment, Comment, Patient, Rating};

    fn appointment(id: &str, patient_id: &str, doctor_id: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            staff_id: None,
            date: None,
            time: None,
            status: "Scheduled".to_string(),
            reason: String::new(),
        }
    }

    fn patient(id: &str) -> Patient {
        Patient {
            id: id.to_string(),
            first_name: "Omar".to_string(),
            last_name: "Farooq".to_string(),
            date_of_birth: None,
            gender: None,
            blood_group: None,
        }
    }

    fn comment(patient_id: &str, doctor_id: &str) -> Comment {
        Comment {
            id: format!("{patient_id}-{doctor_id}"),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            appointment_id: None,
            doctor_rating: Rating::Submitted(5.0),
            overall_rating: Rating::Pending,
            staff_rating: Rating::Pending,
            text: None,
            time: None,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            appointments: vec![
                appointment("a1", "p1", "d1"),
                appointment("a2", "p2", "d1"),
                appointment("a3", "p3", "d2"),
            ],
            patients: vec![patient("p1"), patient("p2"), patient("p3")],
            comments: vec![comment("p1", "d1"), comment("p3", "d2")],
        }
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Doctor".parse::<Role>(), Ok(Role::Doctor));
        assert_eq!(" patient ".parse::<Role>(), Ok(Role::Customer));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Manager));
        assert!(matches!(
            "janitor".parse::<Role>(),
            Err(SessionError::UnknownRole(_))
        ));
    }

    #[test]
    fn personal_roles_need_a_user_id() {
        assert_eq!(
            Session::login(Role::Doctor, Some(" ".to_string()), None),
            Err(SessionError::MissingUserId(Role::Doctor))
        );
        assert!(Session::login(Role::Manager, None, None).is_ok());
    }

    #[test]
    fn doctor_scope_keeps_own_records() {
        let session = Session::login(Role::Doctor, Some("d1".to_string()), None).unwrap();
        let scoped = session.scope(snapshot());
        assert_eq!(scoped.appointments.len(), 2);
        let patient_ids: Vec<&str> = scoped.patients.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(patient_ids, vec!["p1", "p2"]);
        assert_eq!(scoped.comments.len(), 1);
        assert_eq!(session.scope_label(), "doctor d1");
    }

    #[test]
    fn customer_scope_keeps_own_records() {
        let session = Session::login(Role::Customer, Some("p3".to_string()), None).unwrap();
        let scoped = session.scope(snapshot());
        assert_eq!(scoped.appointments.len(), 1);
        assert_eq!(scoped.patients.len(), 1);
        assert_eq!(scoped.comments[0].doctor_id, "d2");
    }

    #[test]
    fn manager_sees_everything() {
        let session =
            Session::login(Role::Manager, Some("m1".to_string()), Some("t".to_string())).unwrap();
        assert_eq!(session.scope(snapshot()), snapshot());
        assert_eq!(session.scope_label(), "all departments");
        assert_eq!(session.token(), Some("t"));
        assert!(!format!("{session:?}").contains("\"t\""));
        session.logout();
    }
}
