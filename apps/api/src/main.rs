use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use visit_schedule_cell::{
    HttpPushTransport, ScheduleState, SchedulingOrchestrator, SupabaseScheduleRepository,
    VisitCatalog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Halisi Maternity API server");

    // Load configuration
    let config = AppConfig::from_env();

    // The catalog is validated once here; a malformed catalog must stop
    // startup rather than fail per-recipient at runtime.
    let catalog = Arc::new(VisitCatalog::standard().context("building standard visit catalog")?);

    let supabase = Arc::new(SupabaseClient::new(&config));
    let repository = Arc::new(SupabaseScheduleRepository::new(supabase));
    let transport = Arc::new(HttpPushTransport::new(&config));

    let orchestrator = SchedulingOrchestrator::new(
        repository,
        transport,
        catalog,
        Duration::from_secs(config.external_call_timeout_seconds),
    );
    let schedule_state = Arc::new(ScheduleState { orchestrator });

    // Daily trigger. Every run is idempotent against the store, so the
    // immediate first tick and any manual /run overlap are safe.
    let timer_state = Arc::clone(&schedule_state);
    let run_interval = Duration::from_secs(config.schedule_run_interval_hours * 3600);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(run_interval);
        loop {
            interval.tick().await;
            let as_of = Utc::now().date_naive();
            match timer_state.orchestrator.run_once(as_of).await {
                Ok(summary) => info!(
                    "Scheduled run finished: {} created, {} skipped, {} failed",
                    summary.created.len(),
                    summary.skipped,
                    summary.failed.len()
                ),
                Err(e) => error!("Scheduled run failed: {}", e),
            }
        }
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(schedule_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.context("binding listener")?;
    axum::serve(listener, app).await.context("serving API")?;

    Ok(())
}
