//! Contrato de persistencia del motor de recordatorios
//!
//! El motor y la API leen y escriben vehículos, clientes y recordatorios a
//! través de este trait; la tecnología de almacenamiento queda fuera del motor.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Customer, NewCustomer, NewReminder, NewVehicle, Reminder, ReminderStatistics,
    ReminderStatus, Vehicle,
};
use crate::utils::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MotStore: Send + Sync {
    /// Todos los vehículos que el barrido debe clasificar
    async fn get_vehicles_needing_classification(&self) -> StoreResult<Vec<Vehicle>>;

    /// Recordatorios en estado `created` o `sent` de un vehículo
    async fn get_active_reminders(&self, vehicle_id: i64) -> StoreResult<Vec<Reminder>>;

    /// Todos los recordatorios de un vehículo, en cualquier estado
    async fn get_reminders_for_vehicle(&self, vehicle_id: i64) -> StoreResult<Vec<Reminder>>;

    /// Falla con `DuplicateActiveReminder` si ya hay uno activo en la misma ventana
    async fn insert_reminder(&self, reminder: NewReminder) -> StoreResult<Reminder>;

    /// Cambiar el estado si sigue siendo `from`; `sent` marca también `sent_at`
    ///
    /// Falla con `Conflict` si otro proceso cambió el estado entretanto.
    async fn update_reminder_status(
        &self,
        id: i64,
        from: ReminderStatus,
        to: ReminderStatus,
        notes: Option<String>,
    ) -> StoreResult<Reminder>;

    async fn find_reminder(&self, id: i64) -> StoreResult<Option<Reminder>>;

    async fn list_reminders(&self, status: Option<ReminderStatus>) -> StoreResult<Vec<Reminder>>;

    async fn reminder_statistics(&self) -> StoreResult<ReminderStatistics>;

    async fn create_vehicle(&self, vehicle: NewVehicle) -> StoreResult<Vehicle>;

    async fn find_vehicle(&self, id: i64) -> StoreResult<Option<Vehicle>>;

    async fn list_vehicles(&self) -> StoreResult<Vec<Vehicle>>;

    /// Edición manual de la expiración (por ejemplo tras renovar el MOT en el taller)
    async fn set_mot_expiry(&self, id: i64, mot_expiry: Option<String>) -> StoreResult<Vehicle>;

    /// Resultado correcto de la DVLA; con `None` se conserva la expiración guardada
    async fn record_mot_verification(
        &self,
        vehicle_id: i64,
        mot_expiry: Option<NaiveDate>,
        verified_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Intento fallido: sólo se anota la hora del intento
    async fn record_verification_attempt(
        &self,
        vehicle_id: i64,
        attempted_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn create_customer(&self, customer: NewCustomer) -> StoreResult<Customer>;

    async fn find_customer(&self, id: i64) -> StoreResult<Option<Customer>>;
}

/// Formato con el que se guardan las expiraciones verificadas
pub fn format_mot_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
