// libs/visit-schedule-cell/src/services/evaluator.rs
use chrono::NaiveDate;
use tracing::debug;

use crate::catalog::VisitCatalog;
use crate::clock::{antenatal_target_date, postnatal_days, postnatal_target_date, weeks_pregnant};
use crate::models::{
    AppointmentRecord, CareRecipient, DueRule, ScheduleError, ScheduleInstruction, VisitTrack,
};

/// Walks the base visit catalog for one recipient and produces the visit
/// instances that are due but not yet on file. Pure over its inputs; all
/// idempotency state comes from the `existing` appointment slice.
pub struct DueVisitEvaluator<'a> {
    catalog: &'a VisitCatalog,
}

impl<'a> DueVisitEvaluator<'a> {
    pub fn new(catalog: &'a VisitCatalog) -> Self {
        Self { catalog }
    }

    pub fn due_visits(
        &self,
        recipient: &CareRecipient,
        as_of: NaiveDate,
        existing: &[AppointmentRecord],
    ) -> Result<Vec<ScheduleInstruction>, ScheduleError> {
        let due_date = recipient
            .due_date
            .ok_or(ScheduleError::MissingDueDate(recipient.id))?;

        let current_weeks = weeks_pregnant(due_date, as_of);
        let days_postnatal = postnatal_days(due_date, as_of);

        debug!(
            "Evaluating recipient {}: {} weeks pregnant, {} postnatal days",
            recipient.id, current_weeks, days_postnatal
        );

        let mut instructions = Vec::new();

        // Catalog tracks are ordered by threshold, so instructions come out
        // in chronological order even when several visits became due since
        // the last run.
        for definition in self.catalog.track(VisitTrack::Antenatal) {
            let threshold = match definition.due_rule {
                DueRule::GestationalWeek(week) => week,
                DueRule::DaysAfterBirth(_) => continue,
            };

            if current_weeks < threshold || already_scheduled(existing, &definition.title) {
                continue;
            }

            let mut details = definition.details.clone();
            for flag in &recipient.conditions {
                if let Some(extra) = definition.enhancement_for(*flag) {
                    details.extend(extra.iter().cloned());
                }
            }

            instructions.push(ScheduleInstruction {
                visit_type: definition.title.clone(),
                track: VisitTrack::Antenatal,
                due_offset: threshold,
                target_date: antenatal_target_date(due_date, threshold),
                details,
            });
        }

        if days_postnatal >= 0 {
            for definition in self.catalog.track(VisitTrack::Postnatal) {
                let offset_days = match definition.due_rule {
                    DueRule::DaysAfterBirth(days) => days,
                    DueRule::GestationalWeek(_) => continue,
                };

                if days_postnatal < offset_days as i64
                    || already_scheduled(existing, &definition.title)
                {
                    continue;
                }

                let mut details = definition.details.clone();
                for flag in &recipient.conditions {
                    if let Some(extra) = definition.enhancement_for(*flag) {
                        details.extend(extra.iter().cloned());
                    }
                }

                instructions.push(ScheduleInstruction {
                    visit_type: definition.title.clone(),
                    track: VisitTrack::Postnatal,
                    due_offset: offset_days,
                    target_date: postnatal_target_date(due_date, offset_days),
                    details,
                });
            }
        }

        Ok(instructions)
    }
}

/// A non-cancelled appointment with this visit type blocks re-creation;
/// cancellations by the CRUD surface are authoritative and release the key.
pub fn already_scheduled(existing: &[AppointmentRecord], visit_type: &str) -> bool {
    existing
        .iter()
        .any(|appointment| appointment.visit_type == visit_type && appointment.blocks_scheduling())
}
