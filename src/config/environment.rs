//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! Todas las claves tienen valor por defecto; un valor mal formado es un error.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DVLA_API_URL: &str =
    "https://driver-vehicle-licensing.api.gov.uk/vehicle-enquiry/v1/vehicles";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("{key} must be at least {min}")]
    OutOfRange { key: String, min: u64 },
}

/// Parámetros de las consultas MOT externas
#[derive(Debug, Clone, PartialEq)]
pub struct LookupConfig {
    pub max_concurrency: usize,
    /// Separación mínima entre el inicio de dos consultas
    pub rate_limit: Duration,
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            rate_limit: Duration::from_millis(1000),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub sweep_interval_hours: u64,
    pub scheduler_enabled: bool,
    pub verify_before_sweep: bool,
    pub dvla_api_url: String,
    pub dvla_api_key: Option<String>,
    pub lookup: LookupConfig,
}

impl EnvironmentConfig {
    /// Leer la configuración desde las variables de entorno
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Construir la configuración a partir de cualquier fuente clave/valor
    pub fn from_source<F>(source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| source(key).filter(|v| !v.trim().is_empty());

        let lookup = LookupConfig {
            max_concurrency: at_least(parse_or(&get, "LOOKUP_MAX_CONCURRENCY", 2)?, 1, "LOOKUP_MAX_CONCURRENCY")? as usize,
            rate_limit: Duration::from_millis(parse_or(&get, "LOOKUP_RATE_LIMIT_MS", 1000u64)?),
            max_attempts: at_least(parse_or(&get, "LOOKUP_MAX_ATTEMPTS", 3)?, 1, "LOOKUP_MAX_ATTEMPTS")? as usize,
            initial_backoff: Duration::from_millis(parse_or(&get, "LOOKUP_INITIAL_BACKOFF_MS", 500u64)?),
            timeout: Duration::from_secs(parse_or(&get, "LOOKUP_TIMEOUT_SECS", 10u64)?),
        };

        Ok(Self {
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port: parse_or(&get, "PORT", 3000u16)?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            database_url: get("DATABASE_URL").unwrap_or_else(|| "memory".to_string()),
            cors_origins: get("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            sweep_interval_hours: at_least(parse_or(&get, "SWEEP_INTERVAL_HOURS", 24)?, 1, "SWEEP_INTERVAL_HOURS")?,
            scheduler_enabled: parse_bool_or(&get, "SCHEDULER_ENABLED", true)?,
            verify_before_sweep: parse_bool_or(&get, "VERIFY_BEFORE_SWEEP", false)?,
            dvla_api_url: get("DVLA_API_URL").unwrap_or_else(|| DEFAULT_DVLA_API_URL.to_string()),
            dvla_api_key: get("DVLA_API_KEY"),
            lookup,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case("memory")
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours * 3600)
    }
}

pub(crate) fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

pub(crate) fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}

fn at_least(value: u64, min: u64, key: &str) -> Result<u64, ConfigError> {
    if value < min {
        return Err(ConfigError::OutOfRange {
            key: key.to_string(),
            min,
        });
    }
    Ok(value)
}
