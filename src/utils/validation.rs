//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para normalizar matrículas
//! e interpretar fechas MOT.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref REGISTRATION_RE: Regex = Regex::new(r"^[A-Z0-9]{2,8}$").unwrap();
}

/// Formatos de fecha aceptados: ISO y el formato británico que emitían las
/// exportaciones antiguas de la DVLA
const MOT_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Normalizar una matrícula: mayúsculas y sin espacios
pub fn normalize_registration(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Normalizar y validar una matrícula
pub fn validate_registration(raw: &str) -> Result<String, ValidationError> {
    let registration = normalize_registration(raw);
    if !REGISTRATION_RE.is_match(&registration) {
        let mut error = ValidationError::new("registration");
        error.add_param("value".into(), &raw.to_string());
        return Err(error);
    }
    Ok(registration)
}

/// Interpretar una fecha de expiración MOT
pub fn parse_mot_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    MOT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Validar una fecha de expiración MOT recibida por la API
pub fn validate_mot_date(value: &str) -> Result<NaiveDate, ValidationError> {
    parse_mot_date(value).ok_or_else(|| {
        let mut error = ValidationError::new("date");
        error.add_param("value".into(), &value.to_string());
        error.add_param("format".into(), &"YYYY-MM-DD".to_string());
        error
    })
}
