//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno
//! y el envío de recordatorios.

pub mod database;
pub mod environment;
pub mod notification;

pub use database::DatabaseConfig;
pub use environment::*;
pub use notification::NotificationConfig;
