use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Bucket, MotStatus, Vehicle};
use crate::services::classifier;
use crate::services::mot_lookup::MotLookupResult;
use crate::utils::validation::parse_mot_date;

// Request para crear un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 2, max = 16))]
    pub registration: String,
    #[validate(length(max = 50))]
    pub make: Option<String>,
    #[validate(length(max = 50))]
    pub model: Option<String>,
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    /// `YYYY-MM-DD` o `DD/MM/YYYY`
    pub mot_expiry: Option<String>,
    pub customer_id: Option<i64>,
}

// Renovación manual del MOT; `null` borra la expiración conocida
#[derive(Debug, Deserialize)]
pub struct UpdateMotExpiryRequest {
    pub mot_expiry: Option<String>,
}

// Response de vehículo con el estado MOT calculado al vuelo
#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    pub id: i64,
    pub registration: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub mot_expiry: Option<String>,
    pub mot_status: MotStatus,
    pub days_remaining: Option<i64>,
    pub bucket: Option<Bucket>,
    pub customer_id: Option<i64>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub last_verification_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VehicleResponse {
    pub fn from_vehicle(vehicle: Vehicle, today: NaiveDate) -> Self {
        let expiry = vehicle.mot_expiry.as_deref().and_then(parse_mot_date);
        let assessment = classifier::assess(expiry, today);
        Self {
            id: vehicle.id,
            registration: vehicle.registration,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            mot_expiry: vehicle.mot_expiry,
            mot_status: assessment.status,
            days_remaining: assessment.days_remaining,
            bucket: assessment.bucket,
            customer_id: vehicle.customer_id,
            last_verified_at: vehicle.last_verified_at,
            last_verification_attempt_at: vehicle.last_verification_attempt_at,
            created_at: vehicle.created_at,
        }
    }
}

// Response de la verificación de un vehículo
#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub vehicle: VehicleResponse,
    pub lookup: MotLookupResult,
}
