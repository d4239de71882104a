// libs/visit-schedule-cell/src/services/expander.rs
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::catalog::VisitCatalog;
use crate::clock::{antenatal_target_date, weeks_pregnant, FULL_TERM_WEEKS};
use crate::models::{
    AppointmentRecord, CareRecipient, ScheduleError, ScheduleInstruction, SupplementalRule,
    VisitTrack,
};
use crate::services::evaluator::already_scheduled;

/// Expands condition-driven supplemental rules into their recurring visit
/// instances. Unlike base visits these recur, so the dedup key carries a
/// stable 1-based occurrence index: the same index always maps to the same
/// gestational week, which keeps re-runs idempotent.
pub struct SupplementalVisitExpander<'a> {
    catalog: &'a VisitCatalog,
}

impl<'a> SupplementalVisitExpander<'a> {
    pub fn new(catalog: &'a VisitCatalog) -> Self {
        Self { catalog }
    }

    pub fn expand(
        &self,
        recipient: &CareRecipient,
        as_of: NaiveDate,
        existing: &[AppointmentRecord],
    ) -> Result<Vec<ScheduleInstruction>, ScheduleError> {
        let due_date = recipient
            .due_date
            .ok_or(ScheduleError::MissingDueDate(recipient.id))?;

        let current_weeks = weeks_pregnant(due_date, as_of);
        let mut instructions = Vec::new();

        for definition in self.catalog.track(VisitTrack::Antenatal) {
            for flag in &recipient.conditions {
                let Some(rule) = definition.supplemental_for(*flag) else {
                    continue;
                };

                let Some(anchor_week) = self.catalog.anchor_week(rule) else {
                    // Unreachable for a validated catalog.
                    warn!(
                        "Supplemental rule '{}' has unresolvable anchor '{}', skipping",
                        rule.title, rule.anchor_title
                    );
                    continue;
                };

                instructions.extend(occurrences(
                    rule,
                    anchor_week,
                    current_weeks,
                    due_date,
                    existing,
                ));
            }
        }

        if !instructions.is_empty() {
            debug!(
                "Expanded {} supplemental visit instances for recipient {}",
                instructions.len(),
                recipient.id
            );
        }

        Ok(instructions)
    }
}

fn occurrences(
    rule: &SupplementalRule,
    anchor_week: u32,
    current_weeks: u32,
    due_date: NaiveDate,
    existing: &[AppointmentRecord],
) -> Vec<ScheduleInstruction> {
    let mut instances = Vec::new();
    let mut week = anchor_week + rule.offset_weeks;
    let mut index = 1u32;

    while week <= FULL_TERM_WEEKS && week <= current_weeks {
        let visit_type = format!("{} #{}", rule.title, index);

        if !already_scheduled(existing, &visit_type) {
            instances.push(ScheduleInstruction {
                visit_type,
                track: VisitTrack::Antenatal,
                due_offset: week,
                target_date: antenatal_target_date(due_date, week),
                details: rule.details.clone(),
            });
        }

        week += rule.frequency_weeks;
        index += 1;
    }

    instances
}
