//! Cliente de la Vehicle Enquiry API de la DVLA
//!
//! Implementa `MotLookup` y traduce los códigos HTTP a `VerificationError`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::mot_lookup::{MotLookup, MotLookupResult, VerificationError};
use crate::utils::validation::normalize_registration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VehicleEnquiryRequest<'a> {
    registration_number: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleEnquiryResponse {
    registration_number: Option<String>,
    mot_status: Option<String>,
    mot_expiry_date: Option<String>,
    make: Option<String>,
    year_of_manufacture: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct DvlaErrorBody {
    errors: Vec<DvlaErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct DvlaErrorDetail {
    title: Option<String>,
    detail: Option<String>,
}

/// Cliente del Vehicle Enquiry Service de la DVLA
pub struct DvlaClient {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl DvlaClient {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, VerificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerificationError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_url,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl MotLookup for DvlaClient {
    async fn lookup_mot_status(&self, registration: &str) -> Result<MotLookupResult, VerificationError> {
        let registration = normalize_registration(registration);
        log::info!("🚗 Consultando DVLA para {}", registration);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&VehicleEnquiryRequest {
                registration_number: &registration,
            })
            .send()
            .await
            .map_err(|e| VerificationError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VerificationError::Network(e.to_string()))?;

        log::debug!("📡 DVLA respondió {} para {}", status, registration);
        parse_enquiry_response(&registration, status, &body)
    }
}

/// Traducir la respuesta HTTP de la DVLA al contrato de consulta
fn parse_enquiry_response(
    registration: &str,
    status: StatusCode,
    body: &str,
) -> Result<MotLookupResult, VerificationError> {
    match status {
        s if s.is_success() => {}
        StatusCode::BAD_REQUEST => {
            let detail = serde_json::from_str::<DvlaErrorBody>(body)
                .ok()
                .and_then(|b| b.errors.into_iter().next())
                .and_then(|e| e.detail.or(e.title))
                .unwrap_or_else(|| registration.to_string());
            log::warn!("❌ DVLA rechazó la matrícula {}: {}", registration, detail);
            return Err(VerificationError::InvalidRegistration(detail));
        }
        StatusCode::NOT_FOUND => return Err(VerificationError::NotFound(registration.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            log::error!("❌ API key de la DVLA inválida");
            return Err(VerificationError::Unauthorized);
        }
        StatusCode::TOO_MANY_REQUESTS => {
            log::warn!("⏳ Límite de peticiones de la DVLA alcanzado ({})", registration);
            return Err(VerificationError::RateLimited);
        }
        s if s.is_server_error() => {
            log::error!("❌ Error de la DVLA {} para {}", s, registration);
            return Err(VerificationError::Upstream { status: s.as_u16() });
        }
        other => {
            log::error!("❌ Respuesta inesperada de la DVLA {} para {}", other, registration);
            return Err(VerificationError::InvalidResponse(format!(
                "Unexpected HTTP status {}",
                other.as_u16()
            )));
        }
    }

    let data: VehicleEnquiryResponse = serde_json::from_str(body)
        .map_err(|e| VerificationError::InvalidResponse(format!("Failed to parse DVLA response: {}", e)))?;

    let expiry_date = match data.mot_expiry_date.as_deref() {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            VerificationError::InvalidResponse(format!("Invalid motExpiryDate '{}'", raw))
        })?),
        None => None,
    };

    Ok(MotLookupResult {
        registration: data
            .registration_number
            .unwrap_or_else(|| registration.to_string()),
        status: data.mot_status.unwrap_or_else(|| "Unknown".to_string()),
        expiry_date,
        make: data.make,
        year_of_manufacture: data.year_of_manufacture,
        verified_at: Utc::now(),
    })
}
