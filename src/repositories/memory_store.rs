//! Almacenamiento en memoria
//!
//! Implementa `MotStore` con las mismas invariantes que PostgreSQL
//! (matrícula única, un recordatorio activo por vehículo y ventana).
//! Se usa en tests y cuando `DATABASE_URL=memory`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::store::{format_mot_date, MotStore, StoreResult};
use crate::models::{
    Customer, NewCustomer, NewReminder, NewVehicle, Reminder, ReminderStatistics,
    ReminderStatus, Vehicle,
};
use crate::utils::errors::StoreError;

#[derive(Default)]
struct MemoryData {
    vehicles: BTreeMap<i64, Vehicle>,
    customers: BTreeMap<i64, Customer>,
    reminders: BTreeMap<i64, Reminder>,
    next_id: i64,
}

impl MemoryData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn vehicle_mut(&mut self, id: i64) -> StoreResult<&mut Vehicle> {
        self.vehicles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("vehicle {}", id)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MotStore for MemoryStore {
    async fn get_vehicles_needing_classification(&self) -> StoreResult<Vec<Vehicle>> {
        let data = self.data.read().await;
        Ok(data.vehicles.values().cloned().collect())
    }

    async fn get_active_reminders(&self, vehicle_id: i64) -> StoreResult<Vec<Reminder>> {
        let data = self.data.read().await;
        Ok(data
            .reminders
            .values()
            .filter(|r| r.vehicle_id == vehicle_id && r.status.is_active())
            .cloned()
            .collect())
    }

    async fn get_reminders_for_vehicle(&self, vehicle_id: i64) -> StoreResult<Vec<Reminder>> {
        let data = self.data.read().await;
        Ok(data
            .reminders
            .values()
            .filter(|r| r.vehicle_id == vehicle_id)
            .cloned()
            .collect())
    }

    async fn insert_reminder(&self, reminder: NewReminder) -> StoreResult<Reminder> {
        let mut data = self.data.write().await;

        if !data.vehicles.contains_key(&reminder.vehicle_id) {
            return Err(StoreError::NotFound(format!("vehicle {}", reminder.vehicle_id)));
        }

        let duplicate = data.reminders.values().any(|r| {
            r.vehicle_id == reminder.vehicle_id && r.bucket == reminder.bucket && r.status.is_active()
        });
        if duplicate {
            return Err(StoreError::DuplicateActiveReminder {
                vehicle_id: reminder.vehicle_id,
                bucket: reminder.bucket,
            });
        }

        let id = data.next_id();
        let stored = Reminder {
            id,
            vehicle_id: reminder.vehicle_id,
            registration: reminder.registration,
            bucket: reminder.bucket,
            status: ReminderStatus::Created,
            mot_expiry: reminder.mot_expiry,
            days_to_expiry: reminder.days_to_expiry,
            created_at: Utc::now(),
            sent_at: None,
            notes: reminder.notes,
        };
        data.reminders.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_reminder_status(
        &self,
        id: i64,
        from: ReminderStatus,
        to: ReminderStatus,
        notes: Option<String>,
    ) -> StoreResult<Reminder> {
        let mut data = self.data.write().await;
        let reminder = data
            .reminders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("reminder {}", id)))?;

        if reminder.status != from {
            return Err(StoreError::Conflict(format!(
                "reminder {} is {}, expected {}",
                id,
                reminder.status.as_str(),
                from.as_str()
            )));
        }

        reminder.status = to;
        if to == ReminderStatus::Sent {
            reminder.sent_at = Some(Utc::now());
        }
        if notes.is_some() {
            reminder.notes = notes;
        }
        Ok(reminder.clone())
    }

    async fn find_reminder(&self, id: i64) -> StoreResult<Option<Reminder>> {
        Ok(self.data.read().await.reminders.get(&id).cloned())
    }

    async fn list_reminders(&self, status: Option<ReminderStatus>) -> StoreResult<Vec<Reminder>> {
        let data = self.data.read().await;
        let mut reminders: Vec<Reminder> = data
            .reminders
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        reminders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reminders)
    }

    async fn reminder_statistics(&self) -> StoreResult<ReminderStatistics> {
        let data = self.data.read().await;
        let mut stats = ReminderStatistics::default();
        for reminder in data.reminders.values() {
            stats.total += 1;
            *stats
                .by_status
                .entry(reminder.status.as_str().to_string())
                .or_insert(0) += 1;
            *stats.by_bucket.entry(reminder.bucket.days()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    async fn create_vehicle(&self, vehicle: NewVehicle) -> StoreResult<Vehicle> {
        let mut data = self.data.write().await;

        if data
            .vehicles
            .values()
            .any(|v| v.registration == vehicle.registration)
        {
            return Err(StoreError::Conflict(format!(
                "vehicle with registration '{}' already exists",
                vehicle.registration
            )));
        }
        if let Some(customer_id) = vehicle.customer_id {
            if !data.customers.contains_key(&customer_id) {
                return Err(StoreError::NotFound(format!("customer {}", customer_id)));
            }
        }

        let id = data.next_id();
        let stored = Vehicle {
            id,
            registration: vehicle.registration,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            mot_expiry: vehicle.mot_expiry,
            customer_id: vehicle.customer_id,
            last_verified_at: None,
            last_verification_attempt_at: None,
            created_at: Utc::now(),
        };
        data.vehicles.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_vehicle(&self, id: i64) -> StoreResult<Option<Vehicle>> {
        Ok(self.data.read().await.vehicles.get(&id).cloned())
    }

    async fn list_vehicles(&self) -> StoreResult<Vec<Vehicle>> {
        Ok(self.data.read().await.vehicles.values().cloned().collect())
    }

    async fn set_mot_expiry(&self, id: i64, mot_expiry: Option<String>) -> StoreResult<Vehicle> {
        let mut data = self.data.write().await;
        let vehicle = data.vehicle_mut(id)?;
        vehicle.mot_expiry = mot_expiry;
        Ok(vehicle.clone())
    }

    async fn record_mot_verification(
        &self,
        vehicle_id: i64,
        mot_expiry: Option<NaiveDate>,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let vehicle = data.vehicle_mut(vehicle_id)?;
        if let Some(expiry) = mot_expiry {
            vehicle.mot_expiry = Some(format_mot_date(expiry));
        }
        vehicle.last_verified_at = Some(verified_at);
        vehicle.last_verification_attempt_at = Some(verified_at);
        Ok(())
    }

    async fn record_verification_attempt(
        &self,
        vehicle_id: i64,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut data = self.data.write().await;
        data.vehicle_mut(vehicle_id)?.last_verification_attempt_at = Some(attempted_at);
        Ok(())
    }

    async fn create_customer(&self, customer: NewCustomer) -> StoreResult<Customer> {
        let mut data = self.data.write().await;
        let id = data.next_id();
        let stored = Customer {
            id,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            address: customer.address,
            created_at: Utc::now(),
        };
        data.customers.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_customer(&self, id: i64) -> StoreResult<Option<Customer>> {
        Ok(self.data.read().await.customers.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bucket;

    fn new_vehicle(registration: &str) -> NewVehicle {
        NewVehicle {
            registration: registration.to_string(),
            make: Some("Ford".to_string()),
            model: Some("Focus".to_string()),
            year: Some(2015),
            mot_expiry: Some("2025-06-01".to_string()),
            customer_id: None,
        }
    }

    fn new_reminder(vehicle_id: i64, bucket: Bucket) -> NewReminder {
        NewReminder {
            vehicle_id,
            registration: "AB12XYZ".to_string(),
            bucket,
            mot_expiry: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            days_to_expiry: bucket.days(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_conflict() {
        let store = MemoryStore::new();
        store.create_vehicle(new_vehicle("AB12XYZ")).await.unwrap();
        let result = store.create_vehicle(new_vehicle("AB12XYZ")).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_one_active_reminder_per_bucket() {
        let store = MemoryStore::new();
        let vehicle = store.create_vehicle(new_vehicle("AB12XYZ")).await.unwrap();

        let first = store.insert_reminder(new_reminder(vehicle.id, Bucket::Days30)).await.unwrap();
        let duplicate = store.insert_reminder(new_reminder(vehicle.id, Bucket::Days30)).await;
        assert!(matches!(duplicate, Err(StoreError::DuplicateActiveReminder { .. })));

        // Otra ventana sí se permite
        store.insert_reminder(new_reminder(vehicle.id, Bucket::Days14)).await.unwrap();

        // Una vez terminado, ya no bloquea
        store
            .update_reminder_status(first.id, ReminderStatus::Created, ReminderStatus::Completed, None)
            .await
            .unwrap();
        store.insert_reminder(new_reminder(vehicle.id, Bucket::Days30)).await.unwrap();

        assert_eq!(store.get_active_reminders(vehicle.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sent_sets_timestamp_and_statistics() {
        let store = MemoryStore::new();
        let vehicle = store.create_vehicle(new_vehicle("AB12XYZ")).await.unwrap();
        let reminder = store.insert_reminder(new_reminder(vehicle.id, Bucket::Days7)).await.unwrap();

        let sent = store
            .update_reminder_status(
                reminder.id,
                ReminderStatus::Created,
                ReminderStatus::Sent,
                Some("email".to_string()),
            )
            .await
            .unwrap();
        assert!(sent.sent_at.is_some());
        assert_eq!(sent.notes.as_deref(), Some("email"));

        let stats = store.reminder_statistics().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.get("sent"), Some(&1));
        assert_eq!(stats.by_bucket.get(&7), Some(&1));
    }

    #[tokio::test]
    async fn test_status_update_requires_expected_status() {
        let store = MemoryStore::new();
        let vehicle = store.create_vehicle(new_vehicle("AB12XYZ")).await.unwrap();
        let stale = store.insert_reminder(new_reminder(vehicle.id, Bucket::Days30)).await.unwrap();

        // Un barrido reemplaza el recordatorio mientras el envío lo tenía leído como `created`
        store
            .update_reminder_status(stale.id, ReminderStatus::Created, ReminderStatus::Completed, None)
            .await
            .unwrap();
        store.insert_reminder(new_reminder(vehicle.id, Bucket::Days30)).await.unwrap();

        let late = store
            .update_reminder_status(stale.id, ReminderStatus::Created, ReminderStatus::Sent, None)
            .await;
        assert!(matches!(late, Err(StoreError::Conflict(_))));

        let stale = store.find_reminder(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, ReminderStatus::Completed);
        assert!(stale.sent_at.is_none());
        assert_eq!(store.get_active_reminders(vehicle.id).await.unwrap().len(), 1);
        assert_eq!(store.get_reminders_for_vehicle(vehicle.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_verification_keeps_expiry() {
        let store = MemoryStore::new();
        let vehicle = store.create_vehicle(new_vehicle("AB12XYZ")).await.unwrap();

        store.record_verification_attempt(vehicle.id, Utc::now()).await.unwrap();
        let after = store.find_vehicle(vehicle.id).await.unwrap().unwrap();
        assert_eq!(after.mot_expiry.as_deref(), Some("2025-06-01"));
        assert!(after.last_verified_at.is_none());
        assert!(after.last_verification_attempt_at.is_some());
    }
}
