//! Controladores: validan la petición y orquestan repositorios y servicios

pub mod customer_controller;
pub mod reminder_controller;
pub mod vehicle_controller;
