//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle y el estado MOT derivado.
//! Mapea exactamente a la tabla `vehicles` del schema PostgreSQL.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Estado MOT del vehículo
///
/// Nunca se guarda como fuente de verdad: siempre se recalcula a partir de
/// la fecha de expiración y la fecha actual.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MotStatus {
    Valid,
    Expired,
    Unknown,
}

impl MotStatus {
    /// Derivar el estado a partir de la expiración conocida
    pub fn derive(expiry: Option<NaiveDate>, today: NaiveDate) -> Self {
        match expiry {
            None => MotStatus::Unknown,
            Some(date) if date < today => MotStatus::Expired,
            Some(_) => MotStatus::Valid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotStatus::Valid => "valid",
            MotStatus::Expired => "expired",
            MotStatus::Unknown => "unknown",
        }
    }
}

/// Vehicle principal - mapea a la tabla vehicles
///
/// `mot_expiry` se guarda como texto porque los datos importados del sistema
/// anterior pueden traer fechas mal formadas; el motor las interpreta al clasificar.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: i64,
    pub registration: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub mot_expiry: Option<String>,
    pub customer_id: Option<i64>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub last_verification_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Datos para insertar un vehículo nuevo (matrícula ya normalizada)
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub registration: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub mot_expiry: Option<String>,
    pub customer_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_mot_status_derive() {
        let today = date("2025-01-01");
        assert_eq!(MotStatus::derive(None, today), MotStatus::Unknown);
        assert_eq!(MotStatus::derive(Some(date("2024-12-31")), today), MotStatus::Expired);
        // El mismo día todavía es válido
        assert_eq!(MotStatus::derive(Some(today), today), MotStatus::Valid);
        assert_eq!(MotStatus::derive(Some(date("2025-06-01")), today), MotStatus::Valid);
    }
}
