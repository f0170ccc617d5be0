//! Contrato de la consulta externa de estado MOT
//!
//! El motor sólo depende de este trait; el cliente DVLA es una implementación.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// Resultado de una consulta correcta
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotLookupResult {
    pub registration: String,
    /// Texto tal cual lo devuelve el servicio ("Valid", "Not valid", "No details held by DVLA"...)
    pub status: String,
    pub expiry_date: Option<NaiveDate>,
    pub make: Option<String>,
    pub year_of_manufacture: Option<i32>,
    pub verified_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Vehicle not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream error: HTTP {status}")]
    Upstream { status: u16 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("MOT lookups are disabled")]
    Disabled,

    #[error("Lookup cancelled")]
    Cancelled,
}

impl VerificationError {
    /// Los errores transitorios se reintentan con backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VerificationError::RateLimited
                | VerificationError::Network(_)
                | VerificationError::Upstream { .. }
        )
    }
}

#[async_trait]
pub trait MotLookup: Send + Sync {
    async fn lookup_mot_status(&self, registration: &str) -> Result<MotLookupResult, VerificationError>;
}

/// Consultas deshabilitadas (sin API key configurada)
pub struct DisabledLookup;

#[async_trait]
impl MotLookup for DisabledLookup {
    async fn lookup_mot_status(&self, _registration: &str) -> Result<MotLookupResult, VerificationError> {
        Err(VerificationError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(VerificationError::RateLimited.is_retryable());
        assert!(VerificationError::Network("timeout".into()).is_retryable());
        assert!(VerificationError::Upstream { status: 503 }.is_retryable());
        assert!(!VerificationError::Unauthorized.is_retryable());
        assert!(!VerificationError::InvalidRegistration("X".into()).is_retryable());
        assert!(!VerificationError::Disabled.is_retryable());
        assert!(!VerificationError::Cancelled.is_retryable());
    }
}
