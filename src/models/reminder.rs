//! Modelo de Reminder
//!
//! Este módulo contiene el recordatorio MOT, su ventana (bucket) y el ciclo
//! de vida de estados.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Ventana de recordatorio en días antes de la expiración del MOT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Bucket {
    Days30,
    Days14,
    Days7,
    Days3,
    Days1,
}

impl Bucket {
    /// Orden de prioridad descendente (30 primero, 1 al final)
    pub const ALL: [Bucket; 5] = [
        Bucket::Days30,
        Bucket::Days14,
        Bucket::Days7,
        Bucket::Days3,
        Bucket::Days1,
    ];

    pub fn days(self) -> i32 {
        match self {
            Bucket::Days30 => 30,
            Bucket::Days14 => 14,
            Bucket::Days7 => 7,
            Bucket::Days3 => 3,
            Bucket::Days1 => 1,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid reminder bucket: {0} days")]
pub struct InvalidBucket(pub i32);

impl TryFrom<i32> for Bucket {
    type Error = InvalidBucket;

    fn try_from(days: i32) -> Result<Self, Self::Error> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| bucket.days() == days)
            .ok_or(InvalidBucket(days))
    }
}

impl From<Bucket> for i32 {
    fn from(bucket: Bucket) -> Self {
        bucket.days()
    }
}

/// Estado del recordatorio - mapea al ENUM reminder_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "reminder_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Created,
    Sent,
    Responded,
    Completed,
    Failed,
}

impl ReminderStatus {
    /// Un recordatorio activo bloquea la creación de otro para la misma ventana
    pub fn is_active(self) -> bool {
        matches!(self, ReminderStatus::Created | ReminderStatus::Sent)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReminderStatus::Completed | ReminderStatus::Failed)
    }

    /// Transiciones permitidas del ciclo de vida
    pub fn can_transition_to(self, next: ReminderStatus) -> bool {
        use ReminderStatus::*;
        matches!(
            (self, next),
            (Created, Sent)
                | (Created, Failed)
                | (Created, Completed)
                | (Sent, Responded)
                | (Sent, Completed)
                | (Sent, Failed)
                | (Responded, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Created => "created",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Responded => "responded",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Failed => "failed",
        }
    }
}

impl FromStr for ReminderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(ReminderStatus::Created),
            "sent" => Ok(ReminderStatus::Sent),
            "responded" => Ok(ReminderStatus::Responded),
            "completed" => Ok(ReminderStatus::Completed),
            "failed" => Ok(ReminderStatus::Failed),
            other => Err(format!("unknown reminder status '{}'", other)),
        }
    }
}

/// Recordatorio MOT - mapea a la tabla mot_reminders
///
/// `mot_expiry` es la expiración vigente cuando se creó el recordatorio; identifica
/// el ciclo MOT al que pertenece.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: i64,
    pub vehicle_id: i64,
    pub registration: String,
    #[sqlx(rename = "bucket_days", try_from = "i32")]
    pub bucket: Bucket,
    pub status: ReminderStatus,
    pub mot_expiry: NaiveDate,
    pub days_to_expiry: i32,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Datos para insertar un recordatorio nuevo
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub vehicle_id: i64,
    pub registration: String,
    pub bucket: Bucket,
    pub mot_expiry: NaiveDate,
    pub days_to_expiry: i32,
    pub notes: Option<String>,
}

/// Estadísticas de recordatorios
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReminderStatistics {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_bucket: BTreeMap<i32, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_from_days() {
        assert_eq!(Bucket::try_from(30).unwrap(), Bucket::Days30);
        assert_eq!(Bucket::try_from(1).unwrap(), Bucket::Days1);
        assert!(Bucket::try_from(0).is_err());
        assert!(Bucket::try_from(21).is_err());
    }

    #[test]
    fn test_bucket_serializes_as_days() {
        assert_eq!(serde_json::to_string(&Bucket::Days14).unwrap(), "14");
        let bucket: Bucket = serde_json::from_str("7").unwrap();
        assert_eq!(bucket, Bucket::Days7);
        assert!(serde_json::from_str::<Bucket>("5").is_err());
    }

    #[test]
    fn test_status_lifecycle() {
        use ReminderStatus::*;
        assert!(Created.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Responded));
        assert!(Sent.can_transition_to(Completed));
        assert!(Created.can_transition_to(Failed));
        assert!(Responded.can_transition_to(Completed));

        assert!(!Completed.can_transition_to(Sent));
        assert!(!Failed.can_transition_to(Created));
        assert!(!Created.can_transition_to(Responded));

        assert!(Created.is_active() && Sent.is_active());
        assert!(!Responded.is_active() && !Responded.is_terminal());
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Sent".parse::<ReminderStatus>().unwrap(), ReminderStatus::Sent);
        assert!("pending".parse::<ReminderStatus>().is_err());
    }
}
