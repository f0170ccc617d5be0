//! Configuración del envío de recordatorios
//!
//! Datos del taller, plantillas y canales (SMTP, pasarela SMS, cartas).
//! Se construye una vez al arrancar y se pasa explícitamente al servicio.

use std::env;
use std::path::PathBuf;

use super::environment::{parse_or, ConfigError};

pub const DEFAULT_SMS_API_URL: &str =
    "https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Messages.json";

#[derive(Debug, Clone, PartialEq)]
pub struct GarageDetails {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
}

impl Default for GarageDetails {
    fn default() -> Self {
        Self {
            name: "Your Garage".to_string(),
            address: "123 Main Street, Anytown, AN1 1AA".to_string(),
            phone: "01234 567890".to_string(),
            email: "info@yourgarage.com".to_string(),
            website: "www.yourgarage.com".to_string(),
        }
    }
}

/// Plantillas con marcadores `{registration}`, `{customer_name}`, `{garage_name}`...
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderTemplates {
    pub email_subject: String,
    pub email_body: String,
    pub sms_body: String,
    pub letter_body: String,
}

impl Default for ReminderTemplates {
    fn default() -> Self {
        let letter = "Dear {customer_name},\n\nThis is a reminder that the MOT for your {make} {model} ({registration}) is due on {mot_expiry}.\n\nPlease contact us to schedule an appointment.\n\nRegards,\n{garage_name}";
        Self {
            email_subject: "MOT Reminder for {registration}".to_string(),
            email_body: letter.to_string(),
            sms_body: "MOT Reminder: Your {make} {model} ({registration}) is due for MOT on {mot_expiry}. Please contact us to schedule an appointment.".to_string(),
            letter_body: letter.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// Pasarela SMS estilo Twilio
#[derive(Debug, Clone, PartialEq)]
pub struct SmsConfig {
    pub api_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl SmsConfig {
    pub fn messages_url(&self) -> String {
        self.api_url.replace("{account_sid}", &self.account_sid)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationConfig {
    pub garage: GarageDetails,
    pub templates: ReminderTemplates,
    pub smtp: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    pub letter_output_dir: Option<PathBuf>,
}

impl NotificationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    pub fn from_source<F>(source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| source(key).filter(|v| !v.trim().is_empty());
        let defaults = GarageDetails::default();

        let garage = GarageDetails {
            name: get("GARAGE_NAME").unwrap_or(defaults.name),
            address: get("GARAGE_ADDRESS").unwrap_or(defaults.address),
            phone: get("GARAGE_PHONE").unwrap_or(defaults.phone),
            email: get("GARAGE_EMAIL").unwrap_or(defaults.email),
            website: get("GARAGE_WEBSITE").unwrap_or(defaults.website),
        };

        // SMTP sólo si hay servidor y remitente
        let smtp = match (get("SMTP_HOST"), get("SMTP_FROM_EMAIL")) {
            (Some(host), Some(from_email)) => Some(SmtpConfig {
                host,
                port: parse_or(&get, "SMTP_PORT", 587u16)?,
                username: get("SMTP_USERNAME").unwrap_or_default(),
                password: get("SMTP_PASSWORD").unwrap_or_default(),
                from_email,
                from_name: get("SMTP_FROM_NAME").unwrap_or_else(|| garage.name.clone()),
            }),
            _ => None,
        };

        let sms = match (get("SMS_ACCOUNT_SID"), get("SMS_AUTH_TOKEN"), get("SMS_FROM_NUMBER")) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsConfig {
                api_url: get("SMS_API_URL").unwrap_or_else(|| DEFAULT_SMS_API_URL.to_string()),
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Ok(Self {
            garage,
            templates: ReminderTemplates::default(),
            smtp,
            sms,
            letter_output_dir: get("LETTER_OUTPUT_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<NotificationConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NotificationConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_channels_disabled_without_settings() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.garage.name, "Your Garage");
        assert!(config.smtp.is_none());
        assert!(config.sms.is_none());
        assert!(config.letter_output_dir.is_none());
    }

    #[test]
    fn test_channels_from_env() {
        let config = config_from(&[
            ("GARAGE_NAME", "Acme Motors"),
            ("SMTP_HOST", "smtp.acme.test"),
            ("SMTP_FROM_EMAIL", "mot@acme.test"),
            ("SMS_ACCOUNT_SID", "AC123"),
            ("SMS_AUTH_TOKEN", "token"),
            ("SMS_FROM_NUMBER", "+441234567890"),
            ("LETTER_OUTPUT_DIR", "/tmp/letters"),
        ])
        .unwrap();

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_name, "Acme Motors");
        assert_eq!(
            config.sms.unwrap().messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(config.letter_output_dir, Some(PathBuf::from("/tmp/letters")));
    }

    #[test]
    fn test_invalid_smtp_port() {
        let result = config_from(&[
            ("SMTP_HOST", "smtp.acme.test"),
            ("SMTP_FROM_EMAIL", "mot@acme.test"),
            ("SMTP_PORT", "smtp"),
        ]);
        assert!(result.is_err());
    }
}
