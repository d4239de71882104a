// libs/visit-schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, ScheduleState};

pub fn visit_schedule_routes(state: Arc<ScheduleState>) -> Router {
    Router::new()
        .route("/run", post(handlers::run_schedule))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
