use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub push_gateway_url: String,
    pub push_gateway_token: String,
    /// Hours between automatic scheduling runs.
    pub schedule_run_interval_hours: u64,
    /// Upper bound for any single repository or transport call.
    pub external_call_timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            push_gateway_url: env::var("PUSH_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("PUSH_GATEWAY_URL not set, using empty value");
                    String::new()
                }),
            push_gateway_token: env::var("PUSH_GATEWAY_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("PUSH_GATEWAY_TOKEN not set, using empty value");
                    String::new()
                }),
            schedule_run_interval_hours: env::var("SCHEDULE_RUN_INTERVAL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            external_call_timeout_seconds: env::var("EXTERNAL_CALL_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_push_configured(&self) -> bool {
        !self.push_gateway_url.is_empty() && !self.push_gateway_token.is_empty()
    }
}
