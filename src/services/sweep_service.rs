//! Barrido de recordatorios MOT
//!
//! Recorre todos los vehículos, los clasifica y aplica el deduplicador.
//! Los barridos se serializan con un mutex compartido entre el scheduler y
//! el endpoint manual: la secuencia leer-decidir-escribir no es segura en paralelo.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Bucket, NewReminder, ReminderStatus, Vehicle};
use crate::repositories::MotStore;
use crate::services::classifier;
use crate::services::deduplicator::{ensure_reminder, ReminderAction};
use crate::utils::errors::{EngineError, StoreError};
use crate::utils::validation::parse_mot_date;

/// Contadores del barrido
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepSummary {
    pub processed: usize,
    pub created: usize,
    pub superseded: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Acción decidida para un vehículo con ventana asignada
#[derive(Debug, Clone, Serialize)]
pub struct VehicleOutcome {
    pub vehicle_id: i64,
    pub registration: String,
    pub bucket: Bucket,
    #[serde(flatten)]
    pub action: ReminderAction,
}

/// Error registrado para un vehículo; no interrumpe el barrido
#[derive(Debug, Clone, Serialize)]
pub struct SweepIssue {
    pub vehicle_id: i64,
    pub registration: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub as_of: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: SweepSummary,
    pub actions: Vec<VehicleOutcome>,
    pub errors: Vec<SweepIssue>,
}

enum VehicleResult {
    /// Sin expiración, vencido o fuera de las ventanas
    Skipped,
    Applied {
        bucket: Bucket,
        action: ReminderAction,
        created: bool,
        superseded: usize,
    },
}

pub struct SweepService {
    store: Arc<dyn MotStore>,
    lock: Mutex<()>,
}

impl SweepService {
    pub fn new(store: Arc<dyn MotStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Ejecutar un barrido completo con fecha de referencia `now`
    pub async fn sweep(&self, now: NaiveDate) -> Result<SweepReport, EngineError> {
        let _guard = self.lock.lock().await;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let vehicles = self.store.get_vehicles_needing_classification().await?;

        info!(
            "🔄 Barrido {} iniciado (fecha {}, {} vehículos)",
            run_id,
            now,
            vehicles.len()
        );

        let mut summary = SweepSummary::default();
        let mut actions = Vec::new();
        let mut errors = Vec::new();

        for vehicle in &vehicles {
            summary.processed += 1;

            match self.process_vehicle(vehicle, now).await {
                Ok(VehicleResult::Skipped) => summary.skipped += 1,
                Ok(VehicleResult::Applied {
                    bucket,
                    action,
                    created,
                    superseded,
                }) => {
                    if created {
                        summary.created += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                    summary.superseded += superseded;
                    actions.push(VehicleOutcome {
                        vehicle_id: vehicle.id,
                        registration: vehicle.registration.clone(),
                        bucket,
                        action,
                    });
                }
                Err(error) => {
                    warn!(
                        "⚠️ Vehículo {} omitido en el barrido: {}",
                        vehicle.registration, error
                    );
                    summary.failed += 1;
                    errors.push(SweepIssue {
                        vehicle_id: vehicle.id,
                        registration: vehicle.registration.clone(),
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }

        info!(
            "✅ Barrido {} terminado: procesados={} creados={} reemplazados={} sin_cambios={} omitidos={} fallidos={}",
            run_id,
            summary.processed,
            summary.created,
            summary.superseded,
            summary.unchanged,
            summary.skipped,
            summary.failed
        );

        Ok(SweepReport {
            run_id,
            as_of: now,
            started_at,
            finished_at: Utc::now(),
            summary,
            actions,
            errors,
        })
    }

    async fn process_vehicle(
        &self,
        vehicle: &Vehicle,
        now: NaiveDate,
    ) -> Result<VehicleResult, EngineError> {
        let raw = match vehicle.mot_expiry.as_deref().map(str::trim) {
            None | Some("") => return Ok(VehicleResult::Skipped),
            Some(raw) => raw,
        };
        let expiry = parse_mot_date(raw).ok_or_else(|| EngineError::InvalidDate {
            registration: vehicle.registration.clone(),
            value: raw.to_string(),
        })?;

        let Some(bucket) = classifier::classify(Some(expiry), now) else {
            return Ok(VehicleResult::Skipped);
        };

        let existing = self.store.get_reminders_for_vehicle(vehicle.id).await?;
        let action = ensure_reminder(expiry, bucket, &existing);

        let (created, superseded) = match &action {
            ReminderAction::NoOp => (false, 0),
            ReminderAction::Create { .. } => {
                (self.create_reminder(vehicle, bucket, expiry, now).await?, 0)
            }
            ReminderAction::SupersedeAndCreate { stale_ids, .. } => {
                for stale in existing.iter().filter(|r| stale_ids.contains(&r.id)) {
                    self.store
                        .update_reminder_status(
                            stale.id,
                            stale.status,
                            ReminderStatus::Completed,
                            Some(format!("Superseded: MOT renewed, new expiry {}", expiry)),
                        )
                        .await?;
                }
                info!(
                    "♻️ {} recordatorio(s) de {} reemplazados por renovación del MOT",
                    stale_ids.len(),
                    vehicle.registration
                );
                (
                    self.create_reminder(vehicle, bucket, expiry, now).await?,
                    stale_ids.len(),
                )
            }
        };

        Ok(VehicleResult::Applied {
            bucket,
            action,
            created,
            superseded,
        })
    }

    /// Insertar el recordatorio; un conflicto de duplicado cuenta como no-op
    async fn create_reminder(
        &self,
        vehicle: &Vehicle,
        bucket: Bucket,
        expiry: NaiveDate,
        now: NaiveDate,
    ) -> Result<bool, EngineError> {
        let days = classifier::days_remaining(expiry, now);
        let reminder = NewReminder {
            vehicle_id: vehicle.id,
            registration: vehicle.registration.clone(),
            bucket,
            mot_expiry: expiry,
            days_to_expiry: i32::try_from(days).unwrap_or(i32::MAX),
            notes: Some(format!(
                "MOT due on {} for vehicle {}",
                expiry, vehicle.registration
            )),
        };

        match self.store.insert_reminder(reminder).await {
            Ok(created) => {
                info!(
                    "📬 Recordatorio {} creado para {} (ventana {}, {} días)",
                    created.id, vehicle.registration, bucket, days
                );
                Ok(true)
            }
            Err(StoreError::DuplicateActiveReminder { .. }) => {
                warn!(
                    "⚠️ Recordatorio duplicado para {} en ventana {}, se ignora",
                    vehicle.registration, bucket
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
