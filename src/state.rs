//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::MotStore;
use crate::services::mot_lookup::MotLookup;
use crate::services::notification_service::NotificationService;
use crate::services::sweep_service::SweepService;
use crate::services::verification_service::VerificationService;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MotStore>,
    pub config: Arc<EnvironmentConfig>,
    /// Compartido con el scheduler: ambos barridos pasan por el mismo mutex
    pub sweep: Arc<SweepService>,
    pub verifier: Arc<VerificationService>,
    pub notifier: Arc<NotificationService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MotStore>,
        config: EnvironmentConfig,
        lookup: Arc<dyn MotLookup>,
        notifier: NotificationService,
    ) -> Self {
        let sweep = Arc::new(SweepService::new(Arc::clone(&store)));
        let verifier = Arc::new(VerificationService::new(
            Arc::clone(&store),
            lookup,
            config.lookup.clone(),
        ));

        Self {
            store,
            config: Arc::new(config),
            sweep,
            verifier,
            notifier: Arc::new(notifier),
        }
    }
}
