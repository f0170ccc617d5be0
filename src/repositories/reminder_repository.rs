//! Repositorio de recordatorios MOT
//!
//! Acceso a la tabla `mot_reminders`. Los cambios de estado son condicionales
//! sobre el estado leído por quien los pide.

use crate::models::{NewReminder, Reminder, ReminderStatistics, ReminderStatus};
use crate::utils::errors::StoreError;
use sqlx::PgPool;

const REMINDER_COLUMNS: &str = "id, vehicle_id, registration, bucket_days, status, mot_expiry, \
     days_to_expiry, created_at, sent_at, notes";

/// Índice parcial que garantiza un recordatorio activo por vehículo y ventana
const ONE_ACTIVE_PER_BUCKET: &str = "mot_reminders_one_active_per_bucket";

pub struct ReminderRepository {
    pool: PgPool,
}

impl ReminderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        let query = format!(
            r#"
            INSERT INTO mot_reminders (vehicle_id, registration, bucket_days, status, mot_expiry, days_to_expiry, notes)
            VALUES ($1, $2, $3, 'created', $4, $5, $6)
            RETURNING {}
            "#,
            REMINDER_COLUMNS
        );

        sqlx::query_as::<_, Reminder>(&query)
            .bind(reminder.vehicle_id)
            .bind(&reminder.registration)
            .bind(reminder.bucket.days())
            .bind(reminder.mot_expiry)
            .bind(reminder.days_to_expiry)
            .bind(reminder.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.constraint() == Some(ONE_ACTIVE_PER_BUCKET) {
                        return StoreError::DuplicateActiveReminder {
                            vehicle_id: reminder.vehicle_id,
                            bucket: reminder.bucket,
                        };
                    }
                }
                StoreError::Database(e)
            })
    }

    pub async fn find_active_by_vehicle(&self, vehicle_id: i64) -> Result<Vec<Reminder>, StoreError> {
        let query = format!(
            "SELECT {} FROM mot_reminders WHERE vehicle_id = $1 AND status IN ('created', 'sent') ORDER BY bucket_days DESC",
            REMINDER_COLUMNS
        );
        let reminders = sqlx::query_as::<_, Reminder>(&query)
            .bind(vehicle_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(reminders)
    }

    pub async fn find_by_vehicle(&self, vehicle_id: i64) -> Result<Vec<Reminder>, StoreError> {
        let query = format!(
            "SELECT {} FROM mot_reminders WHERE vehicle_id = $1 ORDER BY bucket_days DESC, created_at",
            REMINDER_COLUMNS
        );
        let reminders = sqlx::query_as::<_, Reminder>(&query)
            .bind(vehicle_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(reminders)
    }

    pub async fn update_status(
        &self,
        id: i64,
        from: ReminderStatus,
        to: ReminderStatus,
        notes: Option<String>,
    ) -> Result<Reminder, StoreError> {
        let query = format!(
            r#"
            UPDATE mot_reminders
            SET status = $3,
                sent_at = CASE WHEN $3 = 'sent'::reminder_status THEN NOW() ELSE sent_at END,
                notes = COALESCE($4, notes)
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            REMINDER_COLUMNS
        );

        let updated = sqlx::query_as::<_, Reminder>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(notes)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.constraint() == Some(ONE_ACTIVE_PER_BUCKET) {
                        return StoreError::Conflict(format!(
                            "reminder {} cannot become {}: another reminder is active in its window",
                            id,
                            to.as_str()
                        ));
                    }
                }
                StoreError::Database(e)
            })?;

        if let Some(reminder) = updated {
            return Ok(reminder);
        }

        // Sin fila: o no existe o su estado ya no es `from`
        match self.find_by_id(id).await? {
            Some(current) => Err(StoreError::Conflict(format!(
                "reminder {} is {}, expected {}",
                id,
                current.status.as_str(),
                from.as_str()
            ))),
            None => Err(StoreError::NotFound(format!("reminder {}", id))),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Reminder>, StoreError> {
        let query = format!("SELECT {} FROM mot_reminders WHERE id = $1", REMINDER_COLUMNS);
        let reminder = sqlx::query_as::<_, Reminder>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reminder)
    }

    pub async fn list(&self, status: Option<ReminderStatus>) -> Result<Vec<Reminder>, StoreError> {
        let query = format!(
            "SELECT {} FROM mot_reminders WHERE ($1::reminder_status IS NULL OR status = $1) ORDER BY created_at DESC, id DESC",
            REMINDER_COLUMNS
        );
        let reminders = sqlx::query_as::<_, Reminder>(&query)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(reminders)
    }

    pub async fn statistics(&self) -> Result<ReminderStatistics, StoreError> {
        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status::text, COUNT(*) FROM mot_reminders GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_bucket: Vec<(i32, i64)> = sqlx::query_as(
            "SELECT bucket_days, COUNT(*) FROM mot_reminders GROUP BY bucket_days ORDER BY bucket_days",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ReminderStatistics {
            total: by_status.iter().map(|(_, count)| count).sum(),
            by_status: by_status.into_iter().collect(),
            by_bucket: by_bucket.into_iter().collect(),
        })
    }
}
