use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use validator::Validate;

use crate::dto::api_response::ApiResponse;
use crate::dto::reminder_dto::UpdateReminderStatusRequest;
use crate::models::{Reminder, ReminderStatistics, ReminderStatus};
use crate::repositories::MotStore;
use crate::services::notification_service::{DispatchSummary, NotificationService};
use crate::services::sweep_service::{SweepReport, SweepService};
use crate::utils::errors::{not_found_error, AppError};

pub struct ReminderController {
    store: Arc<dyn MotStore>,
    sweep: Arc<SweepService>,
    notifier: Arc<NotificationService>,
}

impl ReminderController {
    pub fn new(
        store: Arc<dyn MotStore>,
        sweep: Arc<SweepService>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            sweep,
            notifier,
        }
    }

    pub async fn sweep(&self, as_of: Option<NaiveDate>) -> Result<ApiResponse<SweepReport>, AppError> {
        let now = as_of.unwrap_or_else(|| Utc::now().date_naive());
        let report = self.sweep.sweep(now).await?;
        let message = format!("{} reminders created", report.summary.created);
        Ok(ApiResponse::success_with_message(report, message))
    }

    pub async fn list(&self, status: Option<ReminderStatus>) -> Result<Vec<Reminder>, AppError> {
        Ok(self.store.list_reminders(status).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Reminder, AppError> {
        self.store
            .find_reminder(id)
            .await?
            .ok_or_else(|| not_found_error("Reminder", &id.to_string()))
    }

    pub async fn statistics(&self) -> Result<ReminderStatistics, AppError> {
        Ok(self.store.reminder_statistics().await?)
    }

    pub async fn update_status(
        &self,
        id: i64,
        request: UpdateReminderStatusRequest,
    ) -> Result<ApiResponse<Reminder>, AppError> {
        request.validate()?;

        let current = self.get_by_id(id).await?;
        if !current.status.can_transition_to(request.status) {
            return Err(AppError::Conflict(format!(
                "Invalid status transition from {} to {}",
                current.status.as_str(),
                request.status.as_str()
            )));
        }

        let updated = self
            .store
            .update_reminder_status(id, current.status, request.status, request.notes)
            .await?;
        tracing::info!(
            "📝 Recordatorio {} pasa de {} a {}",
            id,
            current.status.as_str(),
            updated.status.as_str()
        );

        Ok(ApiResponse::success_with_message(
            updated,
            "Reminder status updated".to_string(),
        ))
    }

    pub async fn dispatch(&self) -> Result<ApiResponse<DispatchSummary>, AppError> {
        let summary = self.notifier.dispatch_pending(Utc::now().date_naive()).await?;
        let message = format!("{} of {} reminders sent", summary.sent, summary.attempted);
        Ok(ApiResponse::success_with_message(summary, message))
    }
}
