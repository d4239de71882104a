// libs/visit-schedule-cell/src/repository.rs
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{
    AppointmentRecord, CareRecipient, NewAppointment, NewNotification, NotificationRecord,
    ScheduleError,
};

/// Result of an appointment insert attempted under the store's uniqueness
/// constraint on `(recipient_id, visit_type)`. A constraint collision is an
/// expected outcome of re-running the engine, not an error.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(AppointmentRecord),
    AlreadyScheduled,
}

/// Store collaborator for the scheduling engine. The engine re-derives all
/// idempotency state through this trait on every run; it never caches
/// between invocations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn list_active_recipients(&self) -> Result<Vec<CareRecipient>, ScheduleError>;

    async fn list_appointments(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<AppointmentRecord>, ScheduleError>;

    async fn create_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<CreateOutcome, ScheduleError>;

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationRecord, ScheduleError>;
}

pub struct SupabaseScheduleRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseScheduleRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}

#[async_trait]
impl ScheduleRepository for SupabaseScheduleRepository {
    async fn list_active_recipients(&self) -> Result<Vec<CareRecipient>, ScheduleError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, "/rest/v1/mothers?status=eq.active&select=*", None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        // Rows that no longer match the recipient shape are a data problem
        // for that row alone, never for the whole batch.
        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<CareRecipient>(row.clone()) {
                Ok(recipient) => recipients.push(recipient),
                Err(e) => {
                    warn!("Skipping malformed recipient row {:?}: {}", row.get("id"), e);
                }
            }
        }

        Ok(recipients)
    }

    async fn list_appointments(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<AppointmentRecord>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?recipient_id=eq.{}&order=date.asc",
            recipient_id
        );

        self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))
    }

    async fn create_appointment(
        &self,
        appointment: NewAppointment,
    ) -> Result<CreateOutcome, ScheduleError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let result: Result<Vec<AppointmentRecord>, SupabaseError> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(body),
                Some(Self::representation_headers()),
            )
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .map(CreateOutcome::Created)
                .ok_or_else(|| {
                    ScheduleError::Database("Insert returned no appointment row".to_string())
                }),
            Err(SupabaseError::Conflict(detail)) => {
                debug!(
                    "Appointment ({}, '{}') already on file: {}",
                    appointment.recipient_id, appointment.visit_type, detail
                );
                Ok(CreateOutcome::AlreadyScheduled)
            }
            Err(e) => Err(ScheduleError::Database(e.to_string())),
        }
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationRecord, ScheduleError> {
        let body = serde_json::to_value(&notification)
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let rows: Vec<NotificationRecord> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/notifications",
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or_else(|| {
            ScheduleError::Database("Insert returned no notification row".to_string())
        })
    }
}
