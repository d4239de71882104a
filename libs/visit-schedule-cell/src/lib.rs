// libs/visit-schedule-cell/src/lib.rs
//
// Gestational visit scheduling engine: decides which antenatal and
// postnatal visits are due for each care recipient, adjusted for risk
// conditions, and emits exactly one appointment and one notification per
// due visit regardless of how often the batch runs.
pub mod catalog;
pub mod clock;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;
pub mod transport;

pub use catalog::{CatalogError, VisitCatalog};
pub use handlers::ScheduleState;
pub use models::{
    AppointmentRecord, AppointmentStatus, CareRecipient, ConditionFlag, RunSummary,
    ScheduleError, SupplementalRule, VisitDefinition, VisitTrack,
};
pub use repository::{CreateOutcome, ScheduleRepository, SupabaseScheduleRepository};
pub use router::visit_schedule_routes;
pub use services::orchestrator::SchedulingOrchestrator;
pub use transport::{HttpPushTransport, NotificationTransport};
