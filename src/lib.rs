//! Motor de recordatorios MOT
//!
//! Clasifica los vehículos por ventanas de expiración (30, 14, 7, 3 y 1 días),
//! crea un único recordatorio activo por vehículo y ventana y verifica el
//! estado MOT contra la DVLA.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
