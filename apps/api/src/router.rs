use std::sync::Arc;

use axum::{routing::get, Router};

use visit_schedule_cell::router::visit_schedule_routes;
use visit_schedule_cell::ScheduleState;

pub fn create_router(schedule_state: Arc<ScheduleState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Halisi Maternity API is running!" }))
        .nest("/api/v1/visit-schedule", visit_schedule_routes(schedule_state))
}
