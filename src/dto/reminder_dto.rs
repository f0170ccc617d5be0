use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::models::ReminderStatus;

// Cambio manual de estado de un recordatorio
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReminderStatusRequest {
    pub status: ReminderStatus,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderListQuery {
    pub status: Option<ReminderStatus>,
}

// Fecha de referencia del barrido; hoy si no se indica
#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DueQuery {
    pub as_of: Option<NaiveDate>,
}
