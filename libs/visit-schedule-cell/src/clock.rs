// libs/visit-schedule-cell/src/clock.rs
//
// Pure gestational date arithmetic. Everything here is total for any pair
// of valid dates; no clocks are read and no side effects occur.
use chrono::{Duration, NaiveDate};

/// Weeks of a full-term pregnancy. Engineering default carried from the
/// source system, not a tunable clinical parameter.
pub const FULL_TERM_WEEKS: u32 = 40;

/// Fixed buffer added to every computed antenatal appointment date.
pub const APPOINTMENT_BUFFER_DAYS: i64 = 2;

/// Gestational weeks as of `as_of`, derived from the due date:
/// `FULL_TERM_WEEKS - ceil(days_remaining / 7)`, clamped to
/// `[0, FULL_TERM_WEEKS]`. A recipient past her due date reports full term.
pub fn weeks_pregnant(due_date: NaiveDate, as_of: NaiveDate) -> u32 {
    let days_remaining = (due_date - as_of).num_days();
    let weeks = FULL_TERM_WEEKS as i64 - ceil_div(days_remaining, 7);
    weeks.clamp(0, FULL_TERM_WEEKS as i64) as u32
}

/// Days elapsed since birth, approximating birth by the due date once term
/// is reached. Negative while the pregnancy is still antenatal.
pub fn postnatal_days(due_date: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of - due_date).num_days()
}

/// Deterministic calendar date for an antenatal visit due at
/// `threshold_weeks`: counted back from the due date, plus the fixed
/// scheduling buffer.
pub fn antenatal_target_date(due_date: NaiveDate, threshold_weeks: u32) -> NaiveDate {
    let weeks_before_term = FULL_TERM_WEEKS.saturating_sub(threshold_weeks);
    due_date - Duration::weeks(weeks_before_term as i64) + Duration::days(APPOINTMENT_BUFFER_DAYS)
}

/// Calendar date for a postnatal visit due `offset_days` after birth. The
/// offset is an absolute day count from the birth anchor, so no buffer is
/// applied.
pub fn postnatal_target_date(due_date: NaiveDate, offset_days: u32) -> NaiveDate {
    due_date + Duration::days(offset_days as i64)
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    if numerator > 0 {
        (numerator + denominator - 1) / denominator
    } else {
        numerator / denominator
    }
}
