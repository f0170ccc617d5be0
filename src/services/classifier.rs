//! Clasificador de expiración MOT
//!
//! Asigna a un vehículo como máximo una ventana de recordatorio a partir de
//! los días que faltan para que expire su MOT. Función pura, sin estado.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Bucket, MotStatus};

/// Resultado completo de la clasificación de un vehículo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotAssessment {
    pub status: MotStatus,
    pub days_remaining: Option<i64>,
    pub bucket: Option<Bucket>,
}

/// Días de calendario entre `now` y la expiración (negativo si ya expiró)
pub fn days_remaining(expiry: NaiveDate, now: NaiveDate) -> i64 {
    (expiry - now).num_days()
}

/// Ventana para un número de días restantes
///
/// El día 0 cae en la ventana de 1 día junto con "vence mañana".
pub fn bucket_for_days(days: i64) -> Option<Bucket> {
    if days < 0 {
        return None;
    }
    Bucket::ALL
        .iter()
        .rev()
        .copied()
        .find(|bucket| days <= i64::from(bucket.days()))
}

/// Clasificar una expiración respecto a `now`
///
/// Sin expiración o con el MOT ya expirado no hay ventana: los vencidos se
/// muestran aparte y nunca reciben recordatorio por ventana.
pub fn classify(expiry: Option<NaiveDate>, now: NaiveDate) -> Option<Bucket> {
    expiry.and_then(|date| bucket_for_days(days_remaining(date, now)))
}

/// Clasificación con estado derivado y días restantes
pub fn assess(expiry: Option<NaiveDate>, now: NaiveDate) -> MotAssessment {
    let days = expiry.map(|date| days_remaining(date, now));
    MotAssessment {
        status: MotStatus::derive(expiry, now),
        days_remaining: days,
        bucket: days.and_then(bucket_for_days),
    }
}
