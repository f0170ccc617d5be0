//! Vista de vehículos con MOT próximo, agrupados por ventana

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Bucket, Vehicle};
use crate::services::classifier;
use crate::utils::validation::parse_mot_date;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DueVehicle {
    pub vehicle_id: i64,
    pub registration: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub customer_id: Option<i64>,
    pub mot_expiry: NaiveDate,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvalidExpiry {
    pub vehicle_id: i64,
    pub registration: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueOverview {
    pub as_of: NaiveDate,
    /// Clave: días de la ventana (30, 14, 7, 3, 1); todas presentes
    pub buckets: BTreeMap<i32, Vec<DueVehicle>>,
    pub expired: Vec<DueVehicle>,
    pub invalid: Vec<InvalidExpiry>,
}

impl DueOverview {
    pub fn total_due(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Agrupar los vehículos por ventana; los de expiración desconocida se omiten
pub fn due_overview(vehicles: &[Vehicle], now: NaiveDate) -> DueOverview {
    let mut buckets: BTreeMap<i32, Vec<DueVehicle>> =
        Bucket::ALL.iter().map(|b| (b.days(), Vec::new())).collect();
    let mut expired = Vec::new();
    let mut invalid = Vec::new();

    for vehicle in vehicles {
        let raw = match vehicle.mot_expiry.as_deref().map(str::trim) {
            None | Some("") => continue,
            Some(raw) => raw,
        };
        let Some(expiry) = parse_mot_date(raw) else {
            invalid.push(InvalidExpiry {
                vehicle_id: vehicle.id,
                registration: vehicle.registration.clone(),
                value: raw.to_string(),
            });
            continue;
        };

        let days = classifier::days_remaining(expiry, now);
        let entry = DueVehicle {
            vehicle_id: vehicle.id,
            registration: vehicle.registration.clone(),
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            customer_id: vehicle.customer_id,
            mot_expiry: expiry,
            days_remaining: days,
        };

        if days < 0 {
            expired.push(entry);
        } else if let Some(bucket) = classifier::bucket_for_days(days) {
            buckets.entry(bucket.days()).or_default().push(entry);
        }
    }

    for list in buckets.values_mut() {
        list.sort_by(|a, b| (a.days_remaining, &a.registration).cmp(&(b.days_remaining, &b.registration)));
    }
    expired.sort_by(|a, b| (a.days_remaining, &a.registration).cmp(&(b.days_remaining, &b.registration)));

    DueOverview {
        as_of: now,
        buckets,
        expired,
        invalid,
    }
}
