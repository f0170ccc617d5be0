//! Envío de recordatorios MOT
//!
//! Toma los recordatorios en estado `created`, renderiza la plantilla del
//! primer canal que puede llegar al cliente (email, SMS, carta) y los pasa
//! a `sent` o `failed`. Los de un ciclo MOT ya renovado se cierran como
//! `completed` sin enviarse.

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::notification::{
    GarageDetails, NotificationConfig, ReminderTemplates, SmsConfig, SmtpConfig,
};
use crate::models::{Customer, Reminder, ReminderStatus, Vehicle};
use crate::repositories::MotStore;
use crate::services::classifier;
use crate::utils::errors::StoreError;
use crate::utils::validation::parse_mot_date;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No usable contact channel: {0}")]
    NoContact(String),

    #[error("No notification channel is configured")]
    ChannelDisabled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Letter,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Letter => "letter",
        }
    }
}

/// Datos de contacto del cliente
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<&Customer> for Recipient {
    fn from(customer: &Customer) -> Self {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());
        Self {
            name: customer.name.clone(),
            email: non_empty(&customer.email),
            phone: non_empty(&customer.phone),
            address: non_empty(&customer.address),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    /// Identificador estable del envío (matrícula e id del recordatorio)
    pub reference: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    fn can_reach(&self, recipient: &Recipient) -> bool;

    async fn send(&self, recipient: &Recipient, message: &RenderedMessage) -> Result<(), DispatchError>;
}

/// Email por SMTP
pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailChannel {
    pub fn new(config: &SmtpConfig) -> Result<Self, DispatchError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| DispatchError::Transport(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| DispatchError::InvalidAddress(format!("from address: {}", e)))?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn can_reach(&self, recipient: &Recipient) -> bool {
        recipient.email.is_some()
    }

    async fn send(&self, recipient: &Recipient, message: &RenderedMessage) -> Result<(), DispatchError> {
        let to = recipient
            .email
            .as_deref()
            .ok_or_else(|| DispatchError::NoContact(recipient.name.clone()))?
            .parse::<Mailbox>()
            .map_err(|e| DispatchError::InvalidAddress(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| DispatchError::Transport(format!("failed to build email: {}", e)))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// SMS a través de una pasarela HTTP
pub struct SmsChannel {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsChannel {
    pub fn new(config: SmsConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DispatchError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn can_reach(&self, recipient: &Recipient) -> bool {
        recipient.phone.is_some()
    }

    async fn send(&self, recipient: &Recipient, message: &RenderedMessage) -> Result<(), DispatchError> {
        let to = recipient
            .phone
            .as_deref()
            .ok_or_else(|| DispatchError::NoContact(recipient.name.clone()))?;

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DispatchError::Transport(format!(
                "SMS gateway returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Carta en texto plano dentro del directorio de salida
pub struct LetterChannel {
    output_dir: PathBuf,
}

impl LetterChannel {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl NotificationChannel for LetterChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Letter
    }

    fn can_reach(&self, recipient: &Recipient) -> bool {
        !recipient.name.trim().is_empty() && recipient.address.is_some()
    }

    async fn send(&self, recipient: &Recipient, message: &RenderedMessage) -> Result<(), DispatchError> {
        let address = recipient
            .address
            .as_deref()
            .ok_or_else(|| DispatchError::NoContact(recipient.name.clone()))?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let content = format!(
            "{}\n{}\n\n{}\n\n{}\n",
            recipient.name, address, message.subject, message.body
        );
        let path = self.output_dir.join(format!("letter_{}.txt", message.reference));
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        info!("✉️ Carta generada en {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    /// Cerrados sin enviar porque el MOT se renovó
    pub superseded: usize,
}

enum Delivery {
    Sent(ChannelKind),
    /// Nueva expiración del vehículo
    Superseded(NaiveDate),
}

pub struct NotificationService {
    store: Arc<dyn MotStore>,
    garage: GarageDetails,
    templates: ReminderTemplates,
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    /// Construir los canales configurados, en orden email, SMS, carta
    pub fn from_config(store: Arc<dyn MotStore>, config: NotificationConfig) -> Result<Self, DispatchError> {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        if let Some(smtp) = &config.smtp {
            channels.push(Box::new(EmailChannel::new(smtp)?));
        }
        if let Some(sms) = config.sms.clone() {
            channels.push(Box::new(SmsChannel::new(sms)?));
        }
        if let Some(dir) = config.letter_output_dir.clone() {
            channels.push(Box::new(LetterChannel::new(dir)));
        }
        Ok(Self::with_channels(store, config, channels))
    }

    pub fn with_channels(
        store: Arc<dyn MotStore>,
        config: NotificationConfig,
        channels: Vec<Box<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            store,
            garage: config.garage,
            templates: config.templates,
            channels,
        }
    }

    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|c| c.kind()).collect()
    }

    /// Enviar todos los recordatorios pendientes
    pub async fn dispatch_pending(&self, now: NaiveDate) -> Result<DispatchSummary, DispatchError> {
        if self.channels.is_empty() {
            return Err(DispatchError::ChannelDisabled);
        }

        let pending = self
            .store
            .list_reminders(Some(ReminderStatus::Created))
            .await?;
        info!("📨 {} recordatorios pendientes de envío", pending.len());

        let mut summary = DispatchSummary::default();
        for reminder in &pending {
            summary.attempted += 1;

            let (status, notes) = match self.dispatch_one(reminder, now).await {
                Ok(Delivery::Sent(kind)) => {
                    summary.sent += 1;
                    (ReminderStatus::Sent, format!("Sent via {}", kind.as_str()))
                }
                Ok(Delivery::Superseded(expiry)) => {
                    info!(
                        "♻️ Recordatorio {} de {} no enviado: MOT renovado hasta {}",
                        reminder.id, reminder.registration, expiry
                    );
                    summary.superseded += 1;
                    (
                        ReminderStatus::Completed,
                        format!("Superseded: MOT renewed, new expiry {}", expiry),
                    )
                }
                Err(DispatchError::Store(e)) => {
                    warn!("⚠️ Recordatorio {} no enviado: {}", reminder.id, e);
                    summary.failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!("❌ Envío del recordatorio {} fallido: {}", reminder.id, e);
                    summary.failed += 1;
                    (ReminderStatus::Failed, format!("Dispatch failed: {}", e))
                }
            };

            match self
                .store
                .update_reminder_status(reminder.id, ReminderStatus::Created, status, Some(notes))
                .await
            {
                Ok(_) => {}
                Err(StoreError::Conflict(msg)) => warn!(
                    "⚠️ Recordatorio {} modificado durante el envío, se conserva su estado: {}",
                    reminder.id, msg
                ),
                Err(e) => warn!("⚠️ No se pudo actualizar el recordatorio {}: {}", reminder.id, e),
            }
        }

        info!(
            "✅ Envío terminado: intentados={} enviados={} fallidos={} reemplazados={}",
            summary.attempted, summary.sent, summary.failed, summary.superseded
        );
        Ok(summary)
    }

    async fn dispatch_one(&self, reminder: &Reminder, now: NaiveDate) -> Result<Delivery, DispatchError> {
        let vehicle = self
            .store
            .find_vehicle(reminder.vehicle_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("vehicle {}", reminder.vehicle_id)))?;

        // La plantilla citaría una expiración que ya no vale
        if let Some(current) = vehicle.mot_expiry.as_deref().and_then(parse_mot_date) {
            if current != reminder.mot_expiry {
                return Ok(Delivery::Superseded(current));
            }
        }

        let customer = match vehicle.customer_id {
            Some(id) => self.store.find_customer(id).await?,
            None => None,
        };
        let Some(customer) = customer else {
            return Err(DispatchError::NoContact(format!(
                "vehicle {} has no customer",
                vehicle.registration
            )));
        };
        let recipient = Recipient::from(&customer);

        let channel = self
            .channels
            .iter()
            .find(|c| c.can_reach(&recipient))
            .ok_or_else(|| DispatchError::NoContact(customer.name.clone()))?;

        let message = self.render(channel.kind(), reminder, &vehicle, &customer, now);
        channel.send(&recipient, &message).await?;
        info!(
            "📬 Recordatorio {} de {} enviado por {}",
            reminder.id,
            reminder.registration,
            channel.kind().as_str()
        );
        Ok(Delivery::Sent(channel.kind()))
    }

    fn render(
        &self,
        kind: ChannelKind,
        reminder: &Reminder,
        vehicle: &Vehicle,
        customer: &Customer,
        now: NaiveDate,
    ) -> RenderedMessage {
        let days = classifier::days_remaining(reminder.mot_expiry, now);
        let values = [
            ("registration", reminder.registration.clone()),
            ("customer_name", customer.name.clone()),
            ("make", vehicle.make.clone().unwrap_or_else(|| "vehicle".to_string())),
            ("model", vehicle.model.clone().unwrap_or_default()),
            ("mot_expiry", reminder.mot_expiry.format("%d/%m/%Y").to_string()),
            ("days_to_expiry", days.to_string()),
            ("garage_name", self.garage.name.clone()),
            ("garage_address", self.garage.address.clone()),
            ("garage_phone", self.garage.phone.clone()),
            ("garage_email", self.garage.email.clone()),
            ("garage_website", self.garage.website.clone()),
        ];

        let body = match kind {
            ChannelKind::Email => &self.templates.email_body,
            ChannelKind::Sms => &self.templates.sms_body,
            ChannelKind::Letter => &self.templates.letter_body,
        };

        RenderedMessage {
            reference: format!("{}_{}", reminder.registration, reminder.id),
            subject: render_template(&self.templates.email_subject, &values),
            body: render_template(body, &values),
        }
    }
}

/// Sustituir los marcadores `{clave}` de la plantilla
pub fn render_template(template: &str, values: &[(&str, String)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bucket, NewCustomer, NewReminder, NewVehicle};
    use crate::repositories::MemoryStore;
    use std::sync::Mutex;

    struct RecordingChannel {
        kind: ChannelKind,
        fail: bool,
        sent: Mutex<Vec<RenderedMessage>>,
    }

    impl RecordingChannel {
        fn new(kind: ChannelKind, fail: bool) -> Self {
            Self {
                kind,
                fail,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationChannel for Arc<RecordingChannel> {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn can_reach(&self, recipient: &Recipient) -> bool {
            match self.kind {
                ChannelKind::Email => recipient.email.is_some(),
                ChannelKind::Sms => recipient.phone.is_some(),
                ChannelKind::Letter => recipient.address.is_some(),
            }
        }

        async fn send(&self, _recipient: &Recipient, message: &RenderedMessage) -> Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError::Transport("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn seed(store: &MemoryStore, registration: &str, customer: Option<NewCustomer>) -> Reminder {
        let customer_id = match customer {
            Some(c) => Some(store.create_customer(c).await.unwrap().id),
            None => None,
        };
        let vehicle = store
            .create_vehicle(NewVehicle {
                registration: registration.to_string(),
                make: Some("FORD".to_string()),
                model: Some("Focus".to_string()),
                year: Some(2015),
                mot_expiry: Some("2025-01-15".to_string()),
                customer_id,
            })
            .await
            .unwrap();
        store
            .insert_reminder(NewReminder {
                vehicle_id: vehicle.id,
                registration: vehicle.registration.clone(),
                bucket: Bucket::Days14,
                mot_expiry: date("2025-01-15"),
                days_to_expiry: 14,
                notes: None,
            })
            .await
            .unwrap()
    }

    fn customer(email: Option<&str>, phone: Option<&str>) -> NewCustomer {
        NewCustomer {
            name: "Jane Smith".to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            address: Some("1 High Street, Anytown".to_string()),
        }
    }

    #[test]
    fn test_render_template() {
        let values = [
            ("registration", "AB12XYZ".to_string()),
            ("garage_name", "Acme Motors".to_string()),
        ];
        assert_eq!(
            render_template("MOT for {registration} - {garage_name} ({unknown})", &values),
            "MOT for AB12XYZ - Acme Motors ({unknown})"
        );
    }

    #[tokio::test]
    async fn test_dispatch_uses_first_reachable_channel() {
        let store = Arc::new(MemoryStore::new());
        let by_email = seed(&store, "AA11AAA", Some(customer(Some("jane@example.com"), None))).await;
        let by_sms = seed(&store, "BB22BBB", Some(customer(None, Some("+447700900000")))).await;

        let email = Arc::new(RecordingChannel::new(ChannelKind::Email, false));
        let sms = Arc::new(RecordingChannel::new(ChannelKind::Sms, false));
        let channels: Vec<Box<dyn NotificationChannel>> =
            vec![Box::new(email.clone()), Box::new(sms.clone())];
        let service =
            NotificationService::with_channels(store.clone(), NotificationConfig::default(), channels);

        let summary = service.dispatch_pending(date("2025-01-01")).await.unwrap();
        assert_eq!(summary, DispatchSummary { attempted: 2, sent: 2, failed: 0, superseded: 0 });

        let emails = email.sent.lock().unwrap().clone();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "MOT Reminder for AA11AAA");
        assert!(emails[0].body.contains("Dear Jane Smith"));
        assert!(emails[0].body.contains("FORD Focus (AA11AAA) is due on 15/01/2025"));
        assert_eq!(sms.sent.lock().unwrap().len(), 1);

        for id in [by_email.id, by_sms.id] {
            let reminder = store.find_reminder(id).await.unwrap().unwrap();
            assert_eq!(reminder.status, ReminderStatus::Sent);
            assert!(reminder.sent_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_unreachable_and_failed_sends_are_marked_failed() {
        let store = Arc::new(MemoryStore::new());
        let orphan = seed(&store, "AA11AAA", None).await;
        let refused = seed(&store, "BB22BBB", Some(customer(Some("jane@example.com"), None))).await;

        let email = Arc::new(RecordingChannel::new(ChannelKind::Email, true));
        let channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(email)];
        let service =
            NotificationService::with_channels(store.clone(), NotificationConfig::default(), channels);

        let summary = service.dispatch_pending(date("2025-01-01")).await.unwrap();
        assert_eq!(summary, DispatchSummary { attempted: 2, sent: 0, failed: 2, superseded: 0 });

        let orphan = store.find_reminder(orphan.id).await.unwrap().unwrap();
        assert_eq!(orphan.status, ReminderStatus::Failed);
        assert!(orphan.notes.unwrap().contains("has no customer"));

        let refused = store.find_reminder(refused.id).await.unwrap().unwrap();
        assert_eq!(refused.status, ReminderStatus::Failed);
        assert!(refused.notes.unwrap().contains("connection refused"));
    }

    /// Canal que, en mitad del envío, cierra los recordatorios pendientes
    /// como haría un barrido concurrente
    struct ClosingChannel {
        store: Arc<MemoryStore>,
    }

    #[async_trait]
    impl NotificationChannel for ClosingChannel {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Email
        }

        fn can_reach(&self, recipient: &Recipient) -> bool {
            recipient.email.is_some()
        }

        async fn send(&self, _recipient: &Recipient, _message: &RenderedMessage) -> Result<(), DispatchError> {
            for reminder in self.store.list_reminders(Some(ReminderStatus::Created)).await? {
                self.store
                    .update_reminder_status(
                        reminder.id,
                        ReminderStatus::Created,
                        ReminderStatus::Completed,
                        None,
                    )
                    .await?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_renewed_mot_reminder_is_closed_not_sent() {
        let store = Arc::new(MemoryStore::new());
        let reminder = seed(&store, "AA11AAA", Some(customer(None, None))).await;
        store
            .set_mot_expiry(reminder.vehicle_id, Some("2026-01-15".to_string()))
            .await
            .unwrap();

        let letter = Arc::new(RecordingChannel::new(ChannelKind::Letter, false));
        let channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(letter.clone())];
        let service =
            NotificationService::with_channels(store.clone(), NotificationConfig::default(), channels);

        let summary = service.dispatch_pending(date("2025-01-01")).await.unwrap();
        assert_eq!(summary, DispatchSummary { attempted: 1, sent: 0, failed: 0, superseded: 1 });
        assert!(letter.sent.lock().unwrap().is_empty());

        let closed = store.find_reminder(reminder.id).await.unwrap().unwrap();
        assert_eq!(closed.status, ReminderStatus::Completed);
        assert!(closed.sent_at.is_none());
        assert!(closed.notes.unwrap().contains("Superseded: MOT renewed, new expiry 2026-01-15"));
    }

    #[tokio::test]
    async fn test_concurrent_close_is_not_overwritten() {
        let store = Arc::new(MemoryStore::new());
        let reminder = seed(&store, "AA11AAA", Some(customer(Some("jane@example.com"), None))).await;

        let channels: Vec<Box<dyn NotificationChannel>> =
            vec![Box::new(ClosingChannel { store: store.clone() })];
        let service =
            NotificationService::with_channels(store.clone(), NotificationConfig::default(), channels);

        service.dispatch_pending(date("2025-01-01")).await.unwrap();

        let stored = store.find_reminder(reminder.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Completed);
        assert!(stored.sent_at.is_none());
        assert!(store.get_active_reminders(reminder.vehicle_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_without_channels_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let reminder = seed(&store, "AA11AAA", None).await;
        let service = NotificationService::from_config(store.clone(), NotificationConfig::default()).unwrap();

        assert!(matches!(
            service.dispatch_pending(date("2025-01-01")).await,
            Err(DispatchError::ChannelDisabled)
        ));
        let untouched = store.find_reminder(reminder.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, ReminderStatus::Created);
    }

    #[tokio::test]
    async fn test_letter_channel_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let reminder = seed(&store, "AA11AAA", Some(customer(None, None))).await;

        let config = NotificationConfig {
            letter_output_dir: Some(dir.path().join("letters")),
            ..NotificationConfig::default()
        };
        let service = NotificationService::from_config(store.clone(), config).unwrap();
        assert_eq!(service.channel_kinds(), vec![ChannelKind::Letter]);

        let summary = service.dispatch_pending(date("2025-01-01")).await.unwrap();
        assert_eq!(summary.sent, 1);

        let path = dir
            .path()
            .join("letters")
            .join(format!("letter_AA11AAA_{}.txt", reminder.id));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("Jane Smith\n1 High Street, Anytown\n"));
        assert!(content.contains("Regards,\nYour Garage"));
    }
}
