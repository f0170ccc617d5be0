//! Planificador de barridos periódicos
//!
//! El `Scheduler` es dueño de su tarea: `start()` la lanza y `stop()` la
//! cancela y espera a que termine. Una ejecución en curso siempre termina.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::repositories::MotStore;
use crate::services::sweep_service::SweepService;
use crate::services::verification_service::VerificationService;

#[async_trait]
pub trait PeriodicJob: Send + Sync {
    fn name(&self) -> &str;

    /// `cancel` se activa al parar el scheduler; el trabajo decide cómo acortar
    async fn run(&self, cancel: &CancellationToken);
}

/// Verificación opcional seguida de un barrido con la fecha del día
pub struct ReminderJob {
    store: Arc<dyn MotStore>,
    sweep: Arc<SweepService>,
    verifier: Option<Arc<VerificationService>>,
}

impl ReminderJob {
    pub fn new(
        store: Arc<dyn MotStore>,
        sweep: Arc<SweepService>,
        verifier: Option<Arc<VerificationService>>,
    ) -> Self {
        Self {
            store,
            sweep,
            verifier,
        }
    }
}

#[async_trait]
impl PeriodicJob for ReminderJob {
    fn name(&self) -> &str {
        "mot-reminder-sweep"
    }

    async fn run(&self, cancel: &CancellationToken) {
        if let Some(verifier) = &self.verifier {
            match self.store.list_vehicles().await {
                Ok(vehicles) => {
                    verifier.verify_all(vehicles, cancel.clone()).await;
                }
                Err(e) => warn!("⚠️ No se pudieron cargar los vehículos para verificar: {}", e),
            }
        }

        if let Err(e) = self.sweep.sweep(Utc::now().date_naive()).await {
            error!("❌ Barrido programado fallido: {}", e);
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    job: Arc<dyn PeriodicJob>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(job: Arc<dyn PeriodicJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Lanzar la tarea periódica; devuelve `false` si ya estaba en marcha
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let job = Arc::clone(&self.job);
        let interval = self.interval;
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        info!("⏰ Ejecutando tarea programada {}", job.name());
                        job.run(&token).await;
                    }
                }
            }
            info!("🛑 Tarea programada {} detenida", job.name());
        });

        info!(
            "📅 Scheduler iniciado para {} (cada {:?})",
            self.job.name(),
            self.interval
        );
        *running = Some(Running { cancel, handle });
        true
    }

    /// Cancelar la tarea y esperar a que termine
    pub async fn stop(&self) {
        let Some(Running { cancel, handle }) = self.running.lock().await.take() else {
            return;
        };
        cancel.cancel();
        if let Err(e) = handle.await {
            error!("❌ La tarea programada terminó con error: {}", e);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewVehicle;
    use crate::repositories::MemoryStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
        duration: Duration,
        finished: AtomicBool,
    }

    impl CountingJob {
        fn new(duration: Duration) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                duration,
                finished: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl PeriodicJob for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, _cancel: &CancellationToken) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.finished.store(false, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_every_tick_until_stopped() {
        let job = CountingJob::new(Duration::ZERO);
        let scheduler = Scheduler::new(job.clone(), Duration::from_secs(3600));

        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);
        tokio::time::sleep(Duration::from_secs(2 * 3600 + 1)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
        tokio::time::sleep(Duration::from_secs(5 * 3600)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_run() {
        let job = CountingJob::new(Duration::from_secs(600));
        let scheduler = Scheduler::new(job.clone(), Duration::from_secs(3600));

        scheduler.start().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(!job.finished.load(Ordering::SeqCst));

        scheduler.stop().await;
        assert!(job.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_reminder_job_sweeps_with_today() {
        let store = Arc::new(MemoryStore::new());
        let expiry = Utc::now().date_naive() + chrono::Duration::days(7);
        store
            .create_vehicle(NewVehicle {
                registration: "AB12XYZ".to_string(),
                make: None,
                model: None,
                year: None,
                mot_expiry: Some(expiry.format("%Y-%m-%d").to_string()),
                customer_id: None,
            })
            .await
            .unwrap();

        let sweep = Arc::new(SweepService::new(store.clone()));
        let job = ReminderJob::new(store.clone(), sweep, None);
        job.run(&CancellationToken::new()).await;

        let reminders = store.list_reminders(None).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].bucket.days(), 7);
    }
}
