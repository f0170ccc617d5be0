use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use dotenvy::dotenv;

use mot_reminders::config::{DatabaseConfig, EnvironmentConfig, NotificationConfig};
use mot_reminders::database::connect_and_migrate;
use mot_reminders::repositories::{MemoryStore, MotStore, PgStore};
use mot_reminders::routes::create_router;
use mot_reminders::services::{
    DisabledLookup, DvlaClient, MotLookup, NotificationService, ReminderJob, Scheduler,
};
use mot_reminders::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mot_reminders=debug")),
        )
        .init();

    info!("🚗 MOT Reminder Engine");
    info!("================================================");

    let config = EnvironmentConfig::from_env()?;
    let notification_config = NotificationConfig::from_env()?;

    let store: Arc<dyn MotStore> = if config.uses_memory_store() {
        warn!("⚠️ DATABASE_URL=memory: los datos no se guardan entre reinicios");
        Arc::new(MemoryStore::new())
    } else {
        let pool = match connect_and_migrate(&DatabaseConfig::new(config.database_url.clone())).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("❌ Error conectando a la base de datos: {:#}", e);
                return Err(e);
            }
        };
        info!("✅ PostgreSQL conectado");
        Arc::new(PgStore::new(pool))
    };

    let lookup: Arc<dyn MotLookup> = match &config.dvla_api_key {
        Some(api_key) => Arc::new(DvlaClient::new(
            config.dvla_api_url.clone(),
            api_key.clone(),
            config.lookup.timeout,
        )?),
        None => {
            warn!("⚠️ DVLA_API_KEY no configurada: verificación MOT deshabilitada");
            Arc::new(DisabledLookup)
        }
    };

    let notifier = NotificationService::from_config(store.clone(), notification_config)?;
    let state = AppState::new(store.clone(), config.clone(), lookup, notifier);

    let verifier = (config.verify_before_sweep && config.dvla_api_key.is_some())
        .then(|| state.verifier.clone());
    let job = ReminderJob::new(store, state.sweep.clone(), verifier);
    let scheduler = Scheduler::new(Arc::new(job), config.sweep_interval());
    if config.scheduler_enabled {
        scheduler.start().await;
    } else {
        info!("⏸️ Scheduler deshabilitado (SCHEDULER_ENABLED=false)");
    }

    let app = create_router(state);
    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("👤 Clientes:");
    info!("   POST /api/customers - Crear cliente");
    info!("   GET  /api/customers/:id - Obtener cliente");
    info!("🚗 Vehículos:");
    info!("   POST /api/vehicles - Registrar vehículo");
    info!("   GET  /api/vehicles - Listar vehículos");
    info!("   GET  /api/vehicles/due - Vehículos por ventana de expiración");
    info!("   GET  /api/vehicles/:id - Obtener vehículo");
    info!("   PUT  /api/vehicles/:id/mot-expiry - Renovación manual del MOT");
    info!("   POST /api/vehicles/:id/verify - Verificar con la DVLA");
    info!("   POST /api/vehicles/verify - Verificar todos los vehículos");
    info!("📬 Recordatorios:");
    info!("   POST /api/reminders/sweep - Ejecutar barrido");
    info!("   GET  /api/reminders - Listar recordatorios");
    info!("   GET  /api/reminders/statistics - Estadísticas");
    info!("   GET  /api/reminders/:id - Obtener recordatorio");
    info!("   PUT  /api/reminders/:id/status - Cambiar estado");
    info!("   POST /api/reminders/dispatch - Enviar recordatorios pendientes");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    scheduler.stop().await;
    info!("👋 Servidor terminado");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el manejador de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
