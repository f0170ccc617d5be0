//! Data transfer objects de la API HTTP

pub mod api_response;
pub mod customer_dto;
pub mod reminder_dto;
pub mod vehicle_dto;

pub use api_response::ApiResponse;
