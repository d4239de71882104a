// libs/visit-schedule-cell/src/transport.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::ScheduleError;

/// Delivery capability for visit reminders. The engine is agnostic to the
/// concrete channel (push, SMS, email); retry policy belongs to the
/// transport collaborator, not to the scheduling run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(
        &self,
        target: Uuid,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> Result<(), ScheduleError>;
}

/// Hands messages to an external push gateway over HTTP.
pub struct HttpPushTransport {
    client: Client,
    gateway_url: String,
    token: String,
}

impl HttpPushTransport {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            gateway_url: config.push_gateway_url.clone(),
            token: config.push_gateway_token.clone(),
        }
    }
}

#[async_trait]
impl NotificationTransport for HttpPushTransport {
    async fn send(
        &self,
        target: Uuid,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> Result<(), ScheduleError> {
        debug!("Sending push notification to recipient {}", target);

        let payload = json!({
            "target": target,
            "title": title,
            "body": body,
            "metadata": metadata,
        });

        let response = self
            .client
            .post(&self.gateway_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScheduleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ScheduleError::Transport(format!(
                "Push gateway returned {}: {}",
                status, detail
            )));
        }

        Ok(())
    }
}
