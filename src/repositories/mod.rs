//! Repositorios
//!
//! Acceso a datos: el trait `MotStore` y sus implementaciones
//! PostgreSQL y en memoria.

pub mod customer_repository;
pub mod memory_store;
pub mod pg_store;
pub mod reminder_repository;
pub mod store;
pub mod vehicle_repository;

pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use store::{MotStore, StoreResult};
