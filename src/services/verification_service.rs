//! Verificación del estado MOT contra el servicio externo
//!
//! Las consultas respetan un máximo de concurrencia, una separación mínima
//! entre llamadas y reintentos con backoff exponencial para los errores
//! transitorios. Un fallo nunca borra la expiración almacenada.

use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::LookupConfig;
use crate::models::Vehicle;
use crate::repositories::MotStore;
use crate::services::mot_lookup::{MotLookup, MotLookupResult, VerificationError};
use crate::utils::errors::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct VerificationIssue {
    pub vehicle_id: i64,
    pub registration: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// Vehículos para los que se completó la consulta (con éxito o no)
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
    /// Vehículos no consultados por cancelación
    pub cancelled: usize,
    pub errors: Vec<VerificationIssue>,
}

enum Outcome {
    Updated,
    Failed(String),
    Cancelled,
}

pub struct VerificationService {
    store: Arc<dyn MotStore>,
    lookup: Arc<dyn MotLookup>,
    config: LookupConfig,
    last_call: Mutex<Option<Instant>>,
}

impl VerificationService {
    pub fn new(store: Arc<dyn MotStore>, lookup: Arc<dyn MotLookup>, config: LookupConfig) -> Self {
        Self {
            store,
            lookup,
            config,
            last_call: Mutex::new(None),
        }
    }

    /// Verificar un único vehículo y guardar el resultado
    pub async fn verify_one(&self, vehicle: &Vehicle) -> Result<MotLookupResult, EngineError> {
        self.verify_vehicle(vehicle, &CancellationToken::new()).await
    }

    /// Verificar un lote de vehículos; deja de lanzar consultas al cancelarse `cancel`
    pub async fn verify_all(&self, vehicles: Vec<Vehicle>, cancel: CancellationToken) -> VerificationReport {
        info!(
            "🔎 Verificando {} vehículos (concurrencia {}, intervalo {:?})",
            vehicles.len(),
            self.config.max_concurrency,
            self.config.rate_limit
        );

        let outcomes: Vec<(Vehicle, Outcome)> = stream::iter(vehicles)
            .map(|vehicle| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (vehicle, Outcome::Cancelled);
                    }
                    let outcome = match self.verify_vehicle(&vehicle, &cancel).await {
                        Ok(_) => Outcome::Updated,
                        Err(EngineError::Verification(VerificationError::Cancelled)) => Outcome::Cancelled,
                        Err(e) => Outcome::Failed(e.to_string()),
                    };
                    (vehicle, outcome)
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = VerificationReport::default();
        for (vehicle, outcome) in outcomes {
            match outcome {
                Outcome::Updated => {
                    report.checked += 1;
                    report.updated += 1;
                }
                Outcome::Failed(message) => {
                    report.checked += 1;
                    report.failed += 1;
                    report.errors.push(VerificationIssue {
                        vehicle_id: vehicle.id,
                        registration: vehicle.registration,
                        message,
                    });
                }
                Outcome::Cancelled => report.cancelled += 1,
            }
        }

        info!(
            "✅ Verificación terminada: consultados={} actualizados={} fallidos={} cancelados={}",
            report.checked, report.updated, report.failed, report.cancelled
        );
        report
    }

    async fn verify_vehicle(
        &self,
        vehicle: &Vehicle,
        cancel: &CancellationToken,
    ) -> Result<MotLookupResult, EngineError> {
        match self.lookup_with_retry(&vehicle.registration, cancel).await {
            Ok(result) => {
                self.store
                    .record_mot_verification(vehicle.id, result.expiry_date, result.verified_at)
                    .await?;
                info!(
                    "✅ MOT de {} verificado: {} (expira {:?})",
                    vehicle.registration, result.status, result.expiry_date
                );
                Ok(result)
            }
            Err(VerificationError::Cancelled) => Err(VerificationError::Cancelled.into()),
            Err(error) => {
                warn!("❌ Verificación de {} fallida: {}", vehicle.registration, error);
                self.store
                    .record_verification_attempt(vehicle.id, Utc::now())
                    .await?;
                Err(error.into())
            }
        }
    }

    async fn lookup_with_retry(
        &self,
        registration: &str,
        cancel: &CancellationToken,
    ) -> Result<MotLookupResult, VerificationError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.config.initial_backoff)
            .with_max_times(self.config.max_attempts.saturating_sub(1));

        (|| async move {
            self.wait_for_slot(cancel).await?;
            self.lookup.lookup_mot_status(registration).await
        })
        .retry(backoff)
        .when(VerificationError::is_retryable)
        .notify(|error, delay| {
            warn!(
                "⏳ Consulta de {} fallida ({}), reintento en {:?}",
                registration, error, delay
            );
        })
        .await
    }

    /// Respetar la separación mínima entre el inicio de dos consultas
    async fn wait_for_slot(&self, cancel: &CancellationToken) -> Result<(), VerificationError> {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            tokio::select! {
                _ = cancel.cancelled() => return Err(VerificationError::Cancelled),
                _ = tokio::time::sleep_until(previous + self.config.rate_limit) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(VerificationError::Cancelled);
        }
        *last_call = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewVehicle;
    use crate::repositories::MemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Consulta simulada: cada matrícula devuelve una secuencia de respuestas
    struct ScriptedLookup {
        responses: std::sync::Mutex<HashMap<String, Vec<Result<Option<NaiveDate>, VerificationError>>>>,
        calls: AtomicUsize,
        call_times: std::sync::Mutex<Vec<Instant>>,
    }

    impl ScriptedLookup {
        fn new(script: Vec<(&str, Vec<Result<Option<NaiveDate>, VerificationError>>)>) -> Self {
            Self {
                responses: std::sync::Mutex::new(
                    script
                        .into_iter()
                        .map(|(reg, mut responses)| {
                            responses.reverse();
                            (reg.to_string(), responses)
                        })
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                call_times: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MotLookup for ScriptedLookup {
        async fn lookup_mot_status(&self, registration: &str) -> Result<MotLookupResult, VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            let next = self
                .responses
                .lock()
                .unwrap()
                .get_mut(registration)
                .and_then(|responses| responses.pop())
                .unwrap_or(Err(VerificationError::NotFound(registration.to_string())));
            next.map(|expiry_date| MotLookupResult {
                registration: registration.to_string(),
                status: "Valid".to_string(),
                expiry_date,
                make: None,
                year_of_manufacture: None,
                verified_at: Utc::now(),
            })
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config() -> LookupConfig {
        LookupConfig {
            max_concurrency: 2,
            rate_limit: Duration::from_millis(1000),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }

    async fn add_vehicle(store: &MemoryStore, registration: &str, expiry: &str) -> Vehicle {
        store
            .create_vehicle(NewVehicle {
                registration: registration.to_string(),
                make: None,
                model: None,
                year: None,
                mot_expiry: Some(expiry.to_string()),
                customer_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_updates_expiry_and_failure_keeps_it() {
        let store = Arc::new(MemoryStore::new());
        let renewed = add_vehicle(&store, "AA11AAA", "2025-01-10").await;
        let unknown = add_vehicle(&store, "BB22BBB", "2025-02-01").await;
        let lookup = Arc::new(ScriptedLookup::new(vec![(
            "AA11AAA",
            vec![Ok(Some(date("2026-01-10")))],
        )]));
        let service = VerificationService::new(store.clone(), lookup, config());

        let vehicles = store.list_vehicles().await.unwrap();
        let report = service.verify_all(vehicles, CancellationToken::new()).await;

        assert_eq!(report.checked, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].registration, "BB22BBB");

        let renewed = store.find_vehicle(renewed.id).await.unwrap().unwrap();
        assert_eq!(renewed.mot_expiry.as_deref(), Some("2026-01-10"));
        assert!(renewed.last_verified_at.is_some());

        let unknown = store.find_vehicle(unknown.id).await.unwrap().unwrap();
        assert_eq!(unknown.mot_expiry.as_deref(), Some("2025-02-01"));
        assert!(unknown.last_verified_at.is_none());
        assert!(unknown.last_verification_attempt_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_are_retried() {
        let store = Arc::new(MemoryStore::new());
        add_vehicle(&store, "AA11AAA", "2025-01-10").await;
        let lookup = Arc::new(ScriptedLookup::new(vec![(
            "AA11AAA",
            vec![
                Err(VerificationError::RateLimited),
                Err(VerificationError::Upstream { status: 503 }),
                Ok(Some(date("2026-01-10"))),
            ],
        )]));
        let service = VerificationService::new(store.clone(), lookup.clone(), config());

        let report = service
            .verify_all(store.list_vehicles().await.unwrap(), CancellationToken::new())
            .await;
        assert_eq!(report.updated, 1);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let vehicle = add_vehicle(&store, "AA11AAA", "2025-01-10").await;
        let lookup = Arc::new(ScriptedLookup::new(vec![(
            "AA11AAA",
            vec![Err(VerificationError::Unauthorized), Ok(Some(date("2026-01-10")))],
        )]));
        let service = VerificationService::new(store.clone(), lookup.clone(), config());

        let result = service.verify_one(&vehicle).await;
        assert!(matches!(
            result,
            Err(EngineError::Verification(VerificationError::Unauthorized))
        ));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_after_max_attempts() {
        let store = Arc::new(MemoryStore::new());
        let vehicle = add_vehicle(&store, "AA11AAA", "2025-01-10").await;
        let lookup = Arc::new(ScriptedLookup::new(vec![(
            "AA11AAA",
            vec![
                Err(VerificationError::Network("reset".into())),
                Err(VerificationError::Network("reset".into())),
                Err(VerificationError::Network("reset".into())),
                Ok(Some(date("2026-01-10"))),
            ],
        )]));
        let service = VerificationService::new(store.clone(), lookup.clone(), config());

        assert!(service.verify_one(&vehicle).await.is_err());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
        let stored = store.find_vehicle(vehicle.id).await.unwrap().unwrap();
        assert_eq!(stored.mot_expiry.as_deref(), Some("2025-01-10"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_rate_limit() {
        let store = Arc::new(MemoryStore::new());
        let mut script = Vec::new();
        let registrations = ["AA11AAA", "BB22BBB", "CC33CCC", "DD44DDD"];
        for reg in registrations {
            add_vehicle(&store, reg, "2025-01-10").await;
            script.push((reg, vec![Ok(Some(date("2026-01-10")))]));
        }
        let lookup = Arc::new(ScriptedLookup::new(script));
        let service = VerificationService::new(store.clone(), lookup.clone(), config());

        let report = service
            .verify_all(store.list_vehicles().await.unwrap(), CancellationToken::new())
            .await;
        assert_eq!(report.updated, 4);

        let mut times = lookup.call_times.lock().unwrap().clone();
        times.sort();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_new_calls() {
        let store = Arc::new(MemoryStore::new());
        for reg in ["AA11AAA", "BB22BBB"] {
            add_vehicle(&store, reg, "2025-01-10").await;
        }
        let lookup = Arc::new(ScriptedLookup::new(vec![]));
        let service = VerificationService::new(store.clone(), lookup.clone(), config());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = service
            .verify_all(store.list_vehicles().await.unwrap(), cancel)
            .await;
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.checked, 0);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);

        let vehicles = store.list_vehicles().await.unwrap();
        assert!(vehicles.iter().all(|v| v.last_verification_attempt_at.is_none()));
    }
}
