//! Rutas HTTP
//!
//! Cada recurso expone su propio router; `create_router` los monta bajo `/api`.

pub mod customer_routes;
pub mod reminder_routes;
pub mod vehicle_routes;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::cors_layer;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .nest("/api/customers", customer_routes::create_customer_router())
        .nest("/api/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/api/reminders", reminder_routes::create_reminder_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "lookups_enabled": state.config.dvla_api_key.is_some(),
        "notification_channels": state.notifier.channel_kinds(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
