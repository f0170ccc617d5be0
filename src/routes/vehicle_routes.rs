use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::controllers::vehicle_controller::VehicleController;
use crate::dto::api_response::ApiResponse;
use crate::dto::reminder_dto::DueQuery;
use crate::dto::vehicle_dto::{
    CreateVehicleRequest, UpdateMotExpiryRequest, VehicleResponse, VerificationResponse,
};
use crate::services::due_overview::DueOverview;
use crate::services::verification_service::VerificationReport;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_vehicle).get(list_vehicles))
        .route("/due", get(due_vehicles))
        .route("/verify", post(verify_all_vehicles))
        .route("/:id", get(get_vehicle))
        .route("/:id/mot-expiry", put(update_mot_expiry))
        .route("/:id/verify", post(verify_vehicle))
}

fn controller(state: &AppState) -> VehicleController {
    VehicleController::new(state.store.clone(), state.verifier.clone())
}

async fn create_vehicle(
    State(state): State<AppState>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let response = controller(&state).create(request).await?;
    Ok(Json(response))
}

async fn list_vehicles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<VehicleResponse>>>, AppError> {
    let response = controller(&state).list().await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let response = controller(&state).get_by_id(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn update_mot_expiry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateMotExpiryRequest>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let response = controller(&state).update_mot_expiry(id, request).await?;
    Ok(Json(response))
}

async fn due_vehicles(
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> Result<Json<ApiResponse<DueOverview>>, AppError> {
    let response = controller(&state).due(query.as_of).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn verify_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<VerificationResponse>>, AppError> {
    let response = controller(&state).verify(id).await?;
    Ok(Json(ApiResponse::success(response)))
}

async fn verify_all_vehicles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<VerificationReport>>, AppError> {
    let response = controller(&state).verify_all().await?;
    Ok(Json(ApiResponse::success(response)))
}
