//! Sistema de manejo de errores
//!
//! Este módulo define los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::Bucket;
use crate::services::mot_lookup::VerificationError;
use crate::services::notification_service::DispatchError;

/// Errores de la capa de persistencia
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Active reminder already exists for vehicle {vehicle_id} in bucket {bucket}")]
    DuplicateActiveReminder { vehicle_id: i64, bucket: Bucket },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Errores del motor de recordatorios, acumulados por vehículo durante un barrido
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid MOT expiry '{value}' for {registration}")]
    InvalidDate { registration: String, value: String },

    #[error("MOT verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("Duplicate reminder for vehicle {vehicle_id} in bucket {bucket}")]
    DuplicateReminderConflict { vehicle_id: i64, bucket: Bucket },

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    /// Código corto para el resumen del barrido
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidDate { .. } => "invalid_date",
            EngineError::Verification(_) => "verification_error",
            EngineError::DuplicateReminderConflict { .. } => "duplicate_reminder_conflict",
            EngineError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateActiveReminder { vehicle_id, bucket } => {
                EngineError::DuplicateReminderConflict { vehicle_id, bucket }
            }
            other => EngineError::Store(other),
        }
    }
}

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("External API error: {0}")]
    ExternalApi(String),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            e @ StoreError::DuplicateActiveReminder { .. } => AppError::Conflict(e.to_string()),
            StoreError::InvalidData(msg) => AppError::Internal(msg),
        }
    }
}

impl From<VerificationError> for AppError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::InvalidRegistration(msg) => AppError::BadRequest(msg),
            VerificationError::NotFound(reg) => {
                AppError::NotFound(format!("Vehicle '{}' not found at DVLA", reg))
            }
            VerificationError::Disabled => {
                AppError::ServiceUnavailable("MOT lookups are not configured".to_string())
            }
            other => AppError::ExternalApi(other.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::ChannelDisabled => {
                AppError::ServiceUnavailable("No notification channel is configured".to_string())
            }
            DispatchError::Store(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(error: EngineError) -> Self {
        match error {
            e @ EngineError::InvalidDate { .. } => AppError::BadRequest(e.to_string()),
            EngineError::Verification(e) => e.into(),
            e @ EngineError::DuplicateReminderConflict { .. } => AppError::Conflict(e.to_string()),
            EngineError::Store(e) => e.into(),
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Database Error".to_string(),
                        message: "An error occurred while accessing the database".to_string(),
                        details: None,
                        code: Some("DB_ERROR".to_string()),
                    },
                )
            }

            AppError::Validation(e) => {
                tracing::warn!("Validation error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Validation Error".to_string(),
                        message: "The provided data is invalid".to_string(),
                        details: Some(json!(e)),
                        code: Some("VALIDATION_ERROR".to_string()),
                    },
                )
            }

            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code: Some("NOT_FOUND".to_string()),
                },
            ),

            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: "Conflict".to_string(),
                    message: msg,
                    details: None,
                    code: Some("CONFLICT".to_string()),
                },
            ),

            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "Bad Request".to_string(),
                    message: msg,
                    details: None,
                    code: Some("BAD_REQUEST".to_string()),
                },
            ),

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "Internal Server Error".to_string(),
                        message: "An unexpected error occurred".to_string(),
                        details: None,
                        code: Some("INTERNAL_ERROR".to_string()),
                    },
                )
            }

            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error: "Service Unavailable".to_string(),
                    message: msg,
                    details: None,
                    code: Some("SERVICE_UNAVAILABLE".to_string()),
                },
            ),

            AppError::ExternalApi(msg) => {
                tracing::warn!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse {
                        error: "External API Error".to_string(),
                        message: "An error occurred while communicating with the DVLA".to_string(),
                        details: Some(json!({ "external_api_error": msg })),
                        code: Some("EXTERNAL_API_ERROR".to_string()),
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, error: validator::ValidationError) -> AppError {
    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);
    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de conflicto
pub fn conflict_error(resource: &str, field: &str, value: &str) -> AppError {
    AppError::Conflict(format!("{} with {} '{}' already exists", resource, field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_store_error_becomes_engine_conflict() {
        let error: EngineError = StoreError::DuplicateActiveReminder {
            vehicle_id: 7,
            bucket: Bucket::Days14,
        }
        .into();
        assert_eq!(error.kind(), "duplicate_reminder_conflict");
    }

    #[test]
    fn test_app_error_status_codes() {
        let response = not_found_error("Vehicle", "42").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = conflict_error("Vehicle", "registration", "AB12XYZ").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::from(VerificationError::Disabled).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
