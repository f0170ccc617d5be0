//! Deduplicador de recordatorios
//!
//! Decide si hay que crear un recordatorio para una ventana, garantizando como
//! máximo un recordatorio por (vehículo, ventana, ciclo MOT) y como máximo uno
//! activo por (vehículo, ventana).

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Bucket, Reminder};

/// Acción a aplicar para un vehículo en una ventana
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReminderAction {
    /// Ya existe un recordatorio para este ciclo, en cualquier estado
    NoOp,
    Create { bucket: Bucket },
    /// Los recordatorios activos pertenecen a una expiración anterior (MOT renovado)
    SupersedeAndCreate { bucket: Bucket, stale_ids: Vec<i64> },
}

impl ReminderAction {
    pub fn creates_reminder(&self) -> bool {
        !matches!(self, ReminderAction::NoOp)
    }
}

/// Decidir la acción para `bucket` dados todos los recordatorios del vehículo
///
/// Un recordatorio cerrado (`completed`, `failed`, `responded`) del ciclo actual
/// sigue contando: la ventana sólo vuelve a abrirse cuando cambia la expiración.
pub fn ensure_reminder(
    current_expiry: NaiveDate,
    bucket: Bucket,
    existing: &[Reminder],
) -> ReminderAction {
    let in_bucket: Vec<&Reminder> = existing.iter().filter(|r| r.bucket == bucket).collect();

    if in_bucket.iter().any(|r| r.mot_expiry == current_expiry) {
        return ReminderAction::NoOp;
    }

    let stale_ids: Vec<i64> = in_bucket
        .iter()
        .filter(|r| r.status.is_active())
        .map(|r| r.id)
        .collect();

    if stale_ids.is_empty() {
        ReminderAction::Create { bucket }
    } else {
        ReminderAction::SupersedeAndCreate { bucket, stale_ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderStatus;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn reminder(id: i64, bucket: Bucket, status: ReminderStatus, expiry: &str) -> Reminder {
        Reminder {
            id,
            vehicle_id: 1,
            registration: "AB12XYZ".to_string(),
            bucket,
            status,
            mot_expiry: date(expiry),
            days_to_expiry: bucket.days(),
            created_at: Utc::now(),
            sent_at: None,
            notes: None,
        }
    }

    #[test]
    fn test_creates_when_nothing_exists() {
        let action = ensure_reminder(date("2025-06-01"), Bucket::Days30, &[]);
        assert_eq!(action, ReminderAction::Create { bucket: Bucket::Days30 });
    }

    #[test]
    fn test_no_op_for_same_cycle() {
        let existing = vec![reminder(1, Bucket::Days30, ReminderStatus::Sent, "2025-06-01")];
        let action = ensure_reminder(date("2025-06-01"), Bucket::Days30, &existing);
        assert_eq!(action, ReminderAction::NoOp);
    }

    #[test]
    fn test_other_buckets_do_not_block() {
        let existing = vec![reminder(1, Bucket::Days30, ReminderStatus::Created, "2025-06-01")];
        let action = ensure_reminder(date("2025-06-01"), Bucket::Days14, &existing);
        assert_eq!(action, ReminderAction::Create { bucket: Bucket::Days14 });
    }

    #[test]
    fn test_closed_reminders_of_same_cycle_block() {
        for status in [ReminderStatus::Completed, ReminderStatus::Failed, ReminderStatus::Responded] {
            let existing = vec![reminder(1, Bucket::Days7, status, "2025-06-01")];
            let action = ensure_reminder(date("2025-06-01"), Bucket::Days7, &existing);
            assert_eq!(action, ReminderAction::NoOp, "{:?}", status);
        }
    }

    #[test]
    fn test_closed_reminders_of_previous_cycle_do_not_block() {
        let existing = vec![
            reminder(1, Bucket::Days7, ReminderStatus::Completed, "2024-06-01"),
            reminder(2, Bucket::Days7, ReminderStatus::Failed, "2024-06-01"),
            reminder(3, Bucket::Days7, ReminderStatus::Responded, "2024-06-01"),
        ];
        let action = ensure_reminder(date("2025-06-01"), Bucket::Days7, &existing);
        assert_eq!(action, ReminderAction::Create { bucket: Bucket::Days7 });
    }

    #[test]
    fn test_renewed_mot_supersedes_stale_reminder() {
        let existing = vec![
            reminder(8, Bucket::Days30, ReminderStatus::Completed, "2024-06-01"),
            reminder(9, Bucket::Days30, ReminderStatus::Sent, "2025-06-01"),
        ];
        let action = ensure_reminder(date("2026-06-01"), Bucket::Days30, &existing);
        assert_eq!(
            action,
            ReminderAction::SupersedeAndCreate {
                bucket: Bucket::Days30,
                stale_ids: vec![9],
            }
        );
        assert!(action.creates_reminder());
    }
}
