//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL.

pub mod customer;
pub mod reminder;
pub mod vehicle;

pub use customer::{Customer, NewCustomer};
pub use reminder::{Bucket, NewReminder, Reminder, ReminderStatistics, ReminderStatus};
pub use vehicle::{MotStatus, NewVehicle, Vehicle};
