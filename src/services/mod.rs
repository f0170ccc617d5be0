//! Services module
//!
//! Este módulo contiene la lógica de negocio: clasificación por ventanas,
//! deduplicación, barridos, verificación externa, envío y planificación.

pub mod classifier;
pub mod deduplicator;
pub mod due_overview;
pub mod dvla_client;
pub mod mot_lookup;
pub mod notification_service;
pub mod scheduler;
pub mod sweep_service;
pub mod verification_service;

pub use deduplicator::{ensure_reminder, ReminderAction};
pub use due_overview::{due_overview, DueOverview};
pub use dvla_client::DvlaClient;
pub use mot_lookup::{DisabledLookup, MotLookup, MotLookupResult, VerificationError};
pub use notification_service::{DispatchError, DispatchSummary, NotificationService};
pub use scheduler::{PeriodicJob, ReminderJob, Scheduler};
pub use sweep_service::{SweepReport, SweepService, SweepSummary};
pub use verification_service::{VerificationReport, VerificationService};
