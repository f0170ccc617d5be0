use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::dto::api_response::ApiResponse;
use crate::dto::vehicle_dto::{
    CreateVehicleRequest, UpdateMotExpiryRequest, VehicleResponse, VerificationResponse,
};
use crate::models::{NewVehicle, Vehicle};
use crate::repositories::store::format_mot_date;
use crate::repositories::MotStore;
use crate::services::due_overview::{due_overview, DueOverview};
use crate::services::verification_service::{VerificationReport, VerificationService};
use crate::utils::errors::{not_found_error, validation_error, AppError};
use crate::utils::validation::{validate_mot_date, validate_registration};

pub struct VehicleController {
    store: Arc<dyn MotStore>,
    verifier: Arc<VerificationService>,
}

impl VehicleController {
    pub fn new(store: Arc<dyn MotStore>, verifier: Arc<VerificationService>) -> Self {
        Self { store, verifier }
    }

    pub async fn create(
        &self,
        request: CreateVehicleRequest,
    ) -> Result<ApiResponse<VehicleResponse>, AppError> {
        request.validate()?;

        let registration = validate_registration(&request.registration)
            .map_err(|e| validation_error("registration", e))?;
        let mot_expiry = normalize_expiry(request.mot_expiry.as_deref())?;

        if let Some(customer_id) = request.customer_id {
            if self.store.find_customer(customer_id).await?.is_none() {
                return Err(AppError::BadRequest(format!(
                    "Customer {} does not exist",
                    customer_id
                )));
            }
        }

        let vehicle = self
            .store
            .create_vehicle(NewVehicle {
                registration,
                make: request.make,
                model: request.model,
                year: request.year,
                mot_expiry,
                customer_id: request.customer_id,
            })
            .await?;
        tracing::info!("🚗 Vehículo {} registrado", vehicle.registration);

        Ok(ApiResponse::success_with_message(
            VehicleResponse::from_vehicle(vehicle, today()),
            "Vehicle created".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<VehicleResponse, AppError> {
        let vehicle = self.find(id).await?;
        Ok(VehicleResponse::from_vehicle(vehicle, today()))
    }

    pub async fn list(&self) -> Result<Vec<VehicleResponse>, AppError> {
        let today = today();
        let vehicles = self.store.list_vehicles().await?;
        Ok(vehicles
            .into_iter()
            .map(|v| VehicleResponse::from_vehicle(v, today))
            .collect())
    }

    pub async fn update_mot_expiry(
        &self,
        id: i64,
        request: UpdateMotExpiryRequest,
    ) -> Result<ApiResponse<VehicleResponse>, AppError> {
        let mot_expiry = normalize_expiry(request.mot_expiry.as_deref())?;
        let vehicle = self.store.set_mot_expiry(id, mot_expiry).await?;
        tracing::info!(
            "🔧 Expiración MOT de {} actualizada a {:?}",
            vehicle.registration,
            vehicle.mot_expiry
        );

        Ok(ApiResponse::success_with_message(
            VehicleResponse::from_vehicle(vehicle, today()),
            "MOT expiry updated".to_string(),
        ))
    }

    pub async fn due(&self, as_of: Option<NaiveDate>) -> Result<DueOverview, AppError> {
        let vehicles = self.store.list_vehicles().await?;
        Ok(due_overview(&vehicles, as_of.unwrap_or_else(today)))
    }

    pub async fn verify(&self, id: i64) -> Result<VerificationResponse, AppError> {
        let vehicle = self.find(id).await?;
        let lookup = self.verifier.verify_one(&vehicle).await?;
        let refreshed = self.find(id).await?;

        Ok(VerificationResponse {
            vehicle: VehicleResponse::from_vehicle(refreshed, today()),
            lookup,
        })
    }

    pub async fn verify_all(&self) -> Result<VerificationReport, AppError> {
        let vehicles = self.store.list_vehicles().await?;
        Ok(self
            .verifier
            .verify_all(vehicles, CancellationToken::new())
            .await)
    }

    async fn find(&self, id: i64) -> Result<Vehicle, AppError> {
        self.store
            .find_vehicle(id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", &id.to_string()))
    }
}

/// Validar la fecha recibida y guardarla en formato ISO
fn normalize_expiry(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let date = validate_mot_date(value).map_err(|e| validation_error("mot_expiry", e))?;
            Ok(Some(format_mot_date(date)))
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
