//! Implementación PostgreSQL de `MotStore`
//!
//! Delega en los repositorios de cada tabla.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use super::customer_repository::CustomerRepository;
use super::reminder_repository::ReminderRepository;
use super::store::{format_mot_date, MotStore, StoreResult};
use super::vehicle_repository::VehicleRepository;
use crate::models::{
    Customer, NewCustomer, NewReminder, NewVehicle, Reminder, ReminderStatistics,
    ReminderStatus, Vehicle,
};

pub struct PgStore {
    vehicles: VehicleRepository,
    customers: CustomerRepository,
    reminders: ReminderRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            vehicles: VehicleRepository::new(pool.clone()),
            customers: CustomerRepository::new(pool.clone()),
            reminders: ReminderRepository::new(pool),
        }
    }
}

#[async_trait]
impl MotStore for PgStore {
    async fn get_vehicles_needing_classification(&self) -> StoreResult<Vec<Vehicle>> {
        self.vehicles.list().await
    }

    async fn get_active_reminders(&self, vehicle_id: i64) -> StoreResult<Vec<Reminder>> {
        self.reminders.find_active_by_vehicle(vehicle_id).await
    }

    async fn get_reminders_for_vehicle(&self, vehicle_id: i64) -> StoreResult<Vec<Reminder>> {
        self.reminders.find_by_vehicle(vehicle_id).await
    }

    async fn insert_reminder(&self, reminder: NewReminder) -> StoreResult<Reminder> {
        self.reminders.insert(reminder).await
    }

    async fn update_reminder_status(
        &self,
        id: i64,
        from: ReminderStatus,
        to: ReminderStatus,
        notes: Option<String>,
    ) -> StoreResult<Reminder> {
        self.reminders.update_status(id, from, to, notes).await
    }

    async fn find_reminder(&self, id: i64) -> StoreResult<Option<Reminder>> {
        self.reminders.find_by_id(id).await
    }

    async fn list_reminders(&self, status: Option<ReminderStatus>) -> StoreResult<Vec<Reminder>> {
        self.reminders.list(status).await
    }

    async fn reminder_statistics(&self) -> StoreResult<ReminderStatistics> {
        self.reminders.statistics().await
    }

    async fn create_vehicle(&self, vehicle: NewVehicle) -> StoreResult<Vehicle> {
        self.vehicles.create(vehicle).await
    }

    async fn find_vehicle(&self, id: i64) -> StoreResult<Option<Vehicle>> {
        self.vehicles.find_by_id(id).await
    }

    async fn list_vehicles(&self) -> StoreResult<Vec<Vehicle>> {
        self.vehicles.list().await
    }

    async fn set_mot_expiry(&self, id: i64, mot_expiry: Option<String>) -> StoreResult<Vehicle> {
        self.vehicles.update_mot_expiry(id, mot_expiry).await
    }

    async fn record_mot_verification(
        &self,
        vehicle_id: i64,
        mot_expiry: Option<NaiveDate>,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.vehicles
            .record_verification(vehicle_id, mot_expiry.map(format_mot_date), verified_at)
            .await
    }

    async fn record_verification_attempt(
        &self,
        vehicle_id: i64,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.vehicles.record_attempt(vehicle_id, attempted_at).await
    }

    async fn create_customer(&self, customer: NewCustomer) -> StoreResult<Customer> {
        self.customers.create(customer).await
    }

    async fn find_customer(&self, id: i64) -> StoreResult<Option<Customer>> {
        self.customers.find_by_id(id).await
    }
}
