use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::controllers::reminder_controller::ReminderController;
use crate::dto::api_response::ApiResponse;
use crate::dto::reminder_dto::{ReminderListQuery, SweepQuery, UpdateReminderStatusRequest};
use crate::models::{Reminder, ReminderStatistics};
use crate::services::notification_service::DispatchSummary;
use crate::services::sweep_service::SweepReport;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_reminder_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reminders))
        .route("/sweep", post(run_sweep))
        .route("/dispatch", post(dispatch_reminders))
        .route("/statistics", get(reminder_statistics))
        .route("/:id", get(get_reminder))
        .route("/:id/status", put(update_reminder_status))
}

fn controller(state: &AppState) -> ReminderController {
    ReminderController::new(
        state.store.clone(),
        state.sweep.clone(),
        state.notifier.clone(),
    )
}

async fn run_sweep(
    State(state): State<AppState>,
    Query(query): Query<SweepQuery>,
) -> Result<Json<ApiResponse<SweepReport>>, AppError> {
    let response = controller(&state).sweep(query.as_of).await?;
    Ok(Json(response))
}

async fn list_reminders(
    State(state): State<AppState>,
    Query(query): Query<ReminderListQuery>,
) -> Result<Json<ApiResponse<Vec<Reminder>>>, AppError> {
    let response = controller(&state).list(query.status).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn get_reminder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Reminder>>, AppError> {
    let response = controller(&state).get_by_id(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn reminder_statistics(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReminderStatistics>>, AppError> {
    let response = controller(&state).statistics().await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn update_reminder_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateReminderStatusRequest>,
) -> Result<Json<ApiResponse<Reminder>>, AppError> {
    let response = controller(&state).update_status(id, request).await?;
    Ok(Json(response))
}

async fn dispatch_reminders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DispatchSummary>>, AppError> {
    let response = controller(&state).dispatch().await?;
    Ok(Json(response))
}
