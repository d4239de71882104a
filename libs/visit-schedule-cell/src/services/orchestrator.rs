// libs/visit-schedule-cell/src/services/orchestrator.rs
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::catalog::VisitCatalog;
use crate::models::{
    AppointmentStatus, CareRecipient, NewAppointment, RunSummary, ScheduleError,
    ScheduleInstruction,
};
use crate::repository::{CreateOutcome, ScheduleRepository};
use crate::services::evaluator::DueVisitEvaluator;
use crate::services::expander::SupplementalVisitExpander;
use crate::services::notifier::NotificationEmitter;
use crate::transport::NotificationTransport;

/// Clinic hour every engine-created appointment is booked for.
pub const DEFAULT_APPOINTMENT_HOUR: u32 = 9;

/// Batch entry point for the scheduling engine. Stateless between runs:
/// idempotency is re-derived from the store on every invocation, so the
/// run may be triggered at any cadence or replayed after a crash. The
/// store's uniqueness constraint on `(recipient_id, visit_type)` is the
/// only concurrency guard.
pub struct SchedulingOrchestrator {
    repository: Arc<dyn ScheduleRepository>,
    notifier: NotificationEmitter,
    catalog: Arc<VisitCatalog>,
    call_timeout: Duration,
}

impl SchedulingOrchestrator {
    pub fn new(
        repository: Arc<dyn ScheduleRepository>,
        transport: Arc<dyn NotificationTransport>,
        catalog: Arc<VisitCatalog>,
        call_timeout: Duration,
    ) -> Self {
        let notifier = NotificationEmitter::new(Arc::clone(&repository), transport);
        Self {
            repository,
            notifier,
            catalog,
            call_timeout,
        }
    }

    /// Runs one scheduling pass over all active recipients. A failure
    /// evaluating one recipient lands in `RunSummary::failed` and never
    /// aborts the batch; only a failure to list recipients at all
    /// surfaces as an error.
    #[instrument(skip(self))]
    pub async fn run_once(&self, as_of: NaiveDate) -> Result<RunSummary, ScheduleError> {
        info!("Starting visit scheduling run as of {}", as_of);

        let recipients = self
            .bounded(self.repository.list_active_recipients())
            .await?;

        let mut summary = RunSummary::default();

        for recipient in recipients {
            match self.process_recipient(&recipient, as_of).await {
                Ok((mut created, skipped)) => {
                    summary.created.append(&mut created);
                    summary.skipped += skipped;
                }
                Err(e) => {
                    warn!("Scheduling failed for recipient {}: {}", recipient.id, e);
                    summary.failed.push(recipient.id);
                }
            }
        }

        info!(
            "Scheduling run complete: {} created, {} skipped, {} failed",
            summary.created.len(),
            summary.skipped,
            summary.failed.len()
        );

        Ok(summary)
    }

    async fn process_recipient(
        &self,
        recipient: &CareRecipient,
        as_of: NaiveDate,
    ) -> Result<(Vec<crate::models::AppointmentRecord>, usize), ScheduleError> {
        let existing = self
            .bounded(self.repository.list_appointments(recipient.id))
            .await?;

        let evaluator = DueVisitEvaluator::new(&self.catalog);
        let expander = SupplementalVisitExpander::new(&self.catalog);

        let mut instructions = evaluator.due_visits(recipient, as_of, &existing)?;
        instructions.extend(expander.expand(recipient, as_of, &existing)?);

        // Chronological emission: a run that catches up after a gap still
        // creates appointments in calendar order for this recipient.
        instructions.sort_by(|a, b| {
            a.target_date
                .cmp(&b.target_date)
                .then_with(|| a.visit_type.cmp(&b.visit_type))
        });

        let mut created = Vec::new();
        let mut skipped = 0;

        for instruction in instructions {
            let appointment = self.to_appointment(recipient, &instruction);

            match self
                .bounded(self.repository.create_appointment(appointment))
                .await?
            {
                CreateOutcome::Created(record) => {
                    if let Err(e) = self
                        .bounded(self.notifier.notify(recipient, &record))
                        .await
                    {
                        // Appointment stands; the notification is
                        // best-effort within a run.
                        warn!(
                            "Notification failed for appointment {}: {}",
                            record.id, e
                        );
                    }
                    created.push(record);
                }
                CreateOutcome::AlreadyScheduled => {
                    debug!(
                        "Visit '{}' already scheduled for recipient {}",
                        instruction.visit_type, recipient.id
                    );
                    skipped += 1;
                }
            }
        }

        Ok((created, skipped))
    }

    fn to_appointment(
        &self,
        recipient: &CareRecipient,
        instruction: &ScheduleInstruction,
    ) -> NewAppointment {
        NewAppointment {
            recipient_id: recipient.id,
            caregiver_id: recipient.caregiver_id,
            visit_type: instruction.visit_type.clone(),
            date: instruction.target_date,
            time: chrono::NaiveTime::from_hms_opt(DEFAULT_APPOINTMENT_HOUR, 0, 0)
                .unwrap_or_default(),
            status: AppointmentStatus::Scheduled,
            description: instruction.description(),
        }
    }

    /// No repository or transport call may block the run indefinitely; a
    /// timeout fails the current item and the batch continues.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ScheduleError>>,
    ) -> Result<T, ScheduleError> {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ScheduleError::Timeout(self.call_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentRecord, ConditionFlag, NewNotification, NotificationRecord};
    use crate::repository::MockScheduleRepository;
    use crate::transport::MockNotificationTransport;
    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn recipient_due_in(days: i64) -> CareRecipient {
        CareRecipient {
            id: Uuid::new_v4(),
            first_name: "Achieng".to_string(),
            last_name: "Odhiambo".to_string(),
            due_date: Some(today() + ChronoDuration::days(days)),
            caregiver_id: Some(Uuid::new_v4()),
            conditions: vec![],
        }
    }

    fn record_from(appointment: &NewAppointment) -> AppointmentRecord {
        AppointmentRecord {
            id: Uuid::new_v4(),
            recipient_id: appointment.recipient_id,
            caregiver_id: appointment.caregiver_id,
            visit_type: appointment.visit_type.clone(),
            date: appointment.date,
            time: appointment.time,
            status: appointment.status.clone(),
            description: appointment.description.clone(),
            created_at: Utc::now(),
        }
    }

    fn notification_from(notification: &NewNotification) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            recipient_id: notification.recipient_id,
            caregiver_id: notification.caregiver_id,
            message: notification.message.clone(),
            date: notification.date,
            source_appointment_id: notification.source_appointment_id,
        }
    }

    fn existing(recipient_id: Uuid, visit_type: &str) -> AppointmentRecord {
        AppointmentRecord {
            id: Uuid::new_v4(),
            recipient_id,
            caregiver_id: None,
            visit_type: visit_type.to_string(),
            date: today() - ChronoDuration::weeks(4),
            time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Attended,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    fn orchestrator(
        repository: MockScheduleRepository,
        transport: MockNotificationTransport,
    ) -> SchedulingOrchestrator {
        SchedulingOrchestrator::new(
            Arc::new(repository),
            Arc::new(transport),
            Arc::new(VisitCatalog::standard().unwrap()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn creates_only_the_newly_due_visit_with_one_notification() {
        // 98 days out = 26 weeks; weeks 12 and 16 already on file, week 22
        // newly due, week 28 not yet.
        let recipient = recipient_due_in(98);
        let recipient_id = recipient.id;

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository
            .expect_list_appointments()
            .return_once(move |id| {
                Ok(vec![
                    existing(id, "First Antenatal Contact"),
                    existing(id, "Second Antenatal Contact"),
                ])
            });
        repository
            .expect_create_appointment()
            .withf(|a| a.visit_type == "Third Antenatal Contact")
            .times(1)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(1)
            .returning(|n| Ok(notification_from(&n)));

        let mut transport = MockNotificationTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.created[0].visit_type, "Third Antenatal Contact");
        assert_eq!(summary.created[0].recipient_id, recipient_id);
        assert_eq!(summary.skipped, 0);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn second_run_with_everything_on_file_creates_nothing() {
        let recipient = recipient_due_in(98);

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository.expect_list_appointments().return_once(move |id| {
            Ok(vec![
                existing(id, "First Antenatal Contact"),
                existing(id, "Second Antenatal Contact"),
                existing(id, "Third Antenatal Contact"),
            ])
        });
        repository.expect_create_appointment().times(0);
        repository.expect_create_notification().times(0);

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(0);

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert!(summary.created.is_empty());
        assert_eq!(summary.skipped, 0);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn catching_up_emits_in_chronological_order() {
        let recipient = recipient_due_in(98);

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository
            .expect_list_appointments()
            .return_once(|_| Ok(vec![]));
        repository
            .expect_create_appointment()
            .times(3)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(3)
            .returning(|n| Ok(notification_from(&n)));

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(3).returning(|_, _, _, _| Ok(()));

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        let types: Vec<&str> = summary
            .created
            .iter()
            .map(|a| a.visit_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                "First Antenatal Contact",
                "Second Antenatal Contact",
                "Third Antenatal Contact",
            ]
        );
        assert!(summary.created.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[tokio::test]
    async fn unique_constraint_collision_counts_as_skipped() {
        let recipient = recipient_due_in(98);

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository.expect_list_appointments().return_once(move |id| {
            Ok(vec![
                existing(id, "First Antenatal Contact"),
                existing(id, "Second Antenatal Contact"),
            ])
        });
        // A concurrent run inserted the same visit between list and create.
        repository
            .expect_create_appointment()
            .times(1)
            .returning(|_| Ok(CreateOutcome::AlreadyScheduled));
        repository.expect_create_notification().times(0);

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(0);

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert!(summary.created.is_empty());
        assert_eq!(summary.skipped, 1);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn recipient_without_due_date_fails_alone() {
        let healthy_a = recipient_due_in(98);
        let mut broken = recipient_due_in(98);
        broken.due_date = None;
        let broken_id = broken.id;
        let healthy_b = recipient_due_in(98);

        let mut repository = MockScheduleRepository::new();
        let batch = vec![healthy_a, broken, healthy_b];
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(batch));
        repository
            .expect_list_appointments()
            .times(3)
            .returning(|_| Ok(vec![]));
        // Both healthy recipients are 26 weeks along: three visits each.
        repository
            .expect_create_appointment()
            .times(6)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(6)
            .returning(|n| Ok(notification_from(&n)));

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(6).returning(|_, _, _, _| Ok(()));

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert_eq!(summary.created.len(), 6);
        assert_eq!(summary.failed, vec![broken_id]);
    }

    #[tokio::test]
    async fn notification_persistence_failure_keeps_the_appointment() {
        let recipient = recipient_due_in(98);

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository.expect_list_appointments().return_once(move |id| {
            Ok(vec![
                existing(id, "First Antenatal Contact"),
                existing(id, "Second Antenatal Contact"),
            ])
        });
        repository
            .expect_create_appointment()
            .times(1)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(1)
            .returning(|_| Err(ScheduleError::Database("notifications down".to_string())));

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(0);

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert_eq!(summary.created.len(), 1);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let recipient = recipient_due_in(98);

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository.expect_list_appointments().return_once(move |id| {
            Ok(vec![
                existing(id, "First Antenatal Contact"),
                existing(id, "Second Antenatal Contact"),
            ])
        });
        repository
            .expect_create_appointment()
            .times(1)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(1)
            .returning(|n| Ok(notification_from(&n)));

        let mut transport = MockNotificationTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_, _, _, _| Err(ScheduleError::Transport("gateway 502".to_string())));

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert_eq!(summary.created.len(), 1);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn repository_failure_for_one_recipient_does_not_abort_the_batch() {
        let failing = recipient_due_in(98);
        let failing_id = failing.id;
        let healthy = recipient_due_in(98);
        let healthy_id = healthy.id;

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![failing, healthy]));
        repository
            .expect_list_appointments()
            .times(2)
            .returning(move |id| {
                if id == failing_id {
                    Err(ScheduleError::Database("row lock timeout".to_string()))
                } else {
                    Ok(vec![
                        existing(id, "First Antenatal Contact"),
                        existing(id, "Second Antenatal Contact"),
                    ])
                }
            });
        repository
            .expect_create_appointment()
            .times(1)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(1)
            .returning(|n| Ok(notification_from(&n)));

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(1).returning(|_, _, _, _| Ok(()));

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        assert_eq!(summary.failed, vec![failing_id]);
        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.created[0].recipient_id, healthy_id);
    }

    #[tokio::test]
    async fn supplemental_visits_ride_along_with_base_visits() {
        let mut recipient = recipient_due_in(98);
        recipient.conditions = vec![ConditionFlag::Hypertension];

        let mut repository = MockScheduleRepository::new();
        repository
            .expect_list_active_recipients()
            .return_once(move || Ok(vec![recipient]));
        repository.expect_list_appointments().return_once(move |id| {
            Ok(vec![
                existing(id, "First Antenatal Contact"),
                existing(id, "Second Antenatal Contact"),
                existing(id, "Third Antenatal Contact"),
            ])
        });
        // 26 weeks, anchor 16, offset 2, frequency 2: reviews at 18, 20,
        // 22, 24, 26.
        repository
            .expect_create_appointment()
            .withf(|a| a.visit_type.starts_with("Blood Pressure Review #"))
            .times(5)
            .returning(|a| Ok(CreateOutcome::Created(record_from(&a))));
        repository
            .expect_create_notification()
            .times(5)
            .returning(|n| Ok(notification_from(&n)));

        let mut transport = MockNotificationTransport::new();
        transport.expect_send().times(5).returning(|_, _, _, _| Ok(()));

        let summary = orchestrator(repository, transport)
            .run_once(today())
            .await
            .unwrap();

        let types: Vec<&str> = summary
            .created
            .iter()
            .map(|a| a.visit_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec![
                "Blood Pressure Review #1",
                "Blood Pressure Review #2",
                "Blood Pressure Review #3",
                "Blood Pressure Review #4",
                "Blood Pressure Review #5",
            ]
        );
    }
}
