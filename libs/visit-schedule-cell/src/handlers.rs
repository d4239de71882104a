// libs/visit-schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use shared_models::error::AppError;

use crate::services::orchestrator::SchedulingOrchestrator;

/// Shared state for the cell's routes.
pub struct ScheduleState {
    pub orchestrator: SchedulingOrchestrator,
}

/// On-demand administrative trigger. The engine is idempotent, so firing
/// this alongside the daily timer is always safe.
pub async fn run_schedule(
    State(state): State<Arc<ScheduleState>>,
) -> Result<Json<Value>, AppError> {
    let as_of = Utc::now().date_naive();
    info!("Manual scheduling run requested for {}", as_of);

    let summary = state
        .orchestrator
        .run_once(as_of)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "summary": summary,
    })))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "visit-schedule-cell",
    }))
}
