// libs/visit-schedule-cell/src/services/notifier.rs
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{AppointmentRecord, CareRecipient, NewNotification, ScheduleError};
use crate::repository::ScheduleRepository;
use crate::transport::NotificationTransport;

/// Emits exactly one notification per newly created appointment: the
/// record is persisted first, then handed to the transport best-effort.
/// Delivery failure never unwinds the appointment (at-least-once
/// notification, at-most-once appointment).
pub struct NotificationEmitter {
    repository: Arc<dyn ScheduleRepository>,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationEmitter {
    pub fn new(
        repository: Arc<dyn ScheduleRepository>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            repository,
            transport,
        }
    }

    pub async fn notify(
        &self,
        recipient: &CareRecipient,
        appointment: &AppointmentRecord,
    ) -> Result<(), ScheduleError> {
        let message = format!(
            "Hello {}, your {} is scheduled for {}.",
            recipient.full_name(),
            appointment.visit_type,
            appointment.date.format("%d %B %Y"),
        );

        let record = self
            .repository
            .create_notification(NewNotification {
                recipient_id: recipient.id,
                caregiver_id: appointment.caregiver_id,
                message: message.clone(),
                date: appointment.date,
                source_appointment_id: Some(appointment.id),
            })
            .await?;

        debug!(
            "Notification {} persisted for appointment {}",
            record.id, appointment.id
        );

        let metadata = json!({ "appointment_id": appointment.id });
        if let Err(e) = self
            .transport
            .send(recipient.id, &appointment.visit_type, &message, metadata)
            .await
        {
            // The transport collaborator owns any retry; the run moves on.
            warn!(
                "Push delivery failed for recipient {} (appointment {}): {}",
                recipient.id, appointment.id, e
            );
        }

        Ok(())
    }
}
