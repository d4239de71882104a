// libs/visit-schedule-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CARE RECIPIENT MODELS
// ==============================================================================

/// Risk conditions that adjust a recipient's visit schedule. Recorded by the
/// health-record CRUD surface; read-only to the scheduling engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFlag {
    Hypertension,
    Diabetes,
    Hiv,
    HighParity,
    HighGravidity,
    ElevatedMentalHealthScore,
    PriorComplications,
}

impl fmt::Display for ConditionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionFlag::Hypertension => write!(f, "hypertension"),
            ConditionFlag::Diabetes => write!(f, "diabetes"),
            ConditionFlag::Hiv => write!(f, "hiv"),
            ConditionFlag::HighParity => write!(f, "high_parity"),
            ConditionFlag::HighGravidity => write!(f, "high_gravidity"),
            ConditionFlag::ElevatedMentalHealthScore => write!(f, "elevated_mental_health_score"),
            ConditionFlag::PriorComplications => write!(f, "prior_complications"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareRecipient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Anchor date for all gestational arithmetic. `None` until the
    /// pregnancy is confirmed by a clinician.
    pub due_date: Option<NaiveDate>,
    pub caregiver_id: Option<Uuid>,
    #[serde(default)]
    pub conditions: Vec<ConditionFlag>,
}

impl CareRecipient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ==============================================================================
// VISIT CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitTrack {
    Antenatal,
    Postnatal,
}

impl fmt::Display for VisitTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitTrack::Antenatal => write!(f, "antenatal"),
            VisitTrack::Postnatal => write!(f, "postnatal"),
        }
    }
}

/// When a visit becomes due. Antenatal visits key off gestational weeks,
/// postnatal visits off days elapsed since birth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DueRule {
    GestationalWeek(u32),
    DaysAfterBirth(u32),
}

/// A recurring condition-specific visit series anchored to a base visit.
/// First occurrence lands `offset_weeks` after the anchor's due week, then
/// repeats every `frequency_weeks` until full term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplementalRule {
    pub title: String,
    pub anchor_title: String,
    pub offset_weeks: u32,
    pub frequency_weeks: u32,
    pub details: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VisitDefinition {
    /// Unique within its track; doubles as the appointment dedup key.
    pub title: String,
    pub track: VisitTrack,
    pub due_rule: DueRule,
    pub details: Vec<String>,
    /// Extra care items merged into the base details for recipients
    /// carrying the flag.
    pub enhancements: Vec<(ConditionFlag, Vec<String>)>,
    /// Recurring supplemental series triggered by the flag.
    pub supplemental: Vec<(ConditionFlag, SupplementalRule)>,
}

impl VisitDefinition {
    pub fn enhancement_for(&self, flag: ConditionFlag) -> Option<&[String]> {
        self.enhancements
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, details)| details.as_slice())
    }

    pub fn supplemental_for(&self, flag: ConditionFlag) -> Option<&SupplementalRule> {
        self.supplemental
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, rule)| rule)
    }
}

// ==============================================================================
// APPOINTMENT AND NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Attended,
    Cancelled,
    Missed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Attended => write!(f, "attended"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Missed => write!(f, "missed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub caregiver_id: Option<Uuid>,
    /// Natural dedup key: the visit title, suffixed with an occurrence
    /// index for supplemental visits.
    pub visit_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl AppointmentRecord {
    /// Cancelled appointments release the dedup key; the CRUD surface's
    /// cancellation is authoritative and the engine may schedule afresh.
    pub fn blocks_scheduling(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

/// Insert payload for an appointment; the store assigns id and created_at.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub recipient_id: Uuid,
    pub caregiver_id: Option<Uuid>,
    pub visit_type: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub caregiver_id: Option<Uuid>,
    pub message: String,
    pub date: NaiveDate,
    pub source_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub caregiver_id: Option<Uuid>,
    pub message: String,
    pub date: NaiveDate,
    pub source_appointment_id: Option<Uuid>,
}

// ==============================================================================
// SCHEDULING MODELS
// ==============================================================================

/// One visit instance the evaluator or expander has determined to be due
/// and not yet on file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleInstruction {
    /// Dedup key; matches `AppointmentRecord::visit_type`.
    pub visit_type: String,
    pub track: VisitTrack,
    /// Gestational week (antenatal) or days after birth (postnatal).
    pub due_offset: u32,
    pub target_date: NaiveDate,
    pub details: Vec<String>,
}

impl ScheduleInstruction {
    pub fn description(&self) -> String {
        self.details.join("; ")
    }
}

/// Aggregate outcome of one batch run. Per-recipient failures never
/// surface beyond this summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub created: Vec<AppointmentRecord>,
    pub skipped: usize,
    pub failed: Vec<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Recipient {0} has no due date on file")]
    MissingDueDate(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Call timed out after {0} seconds")]
    Timeout(u64),
}
