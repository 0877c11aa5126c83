//! Weekly slot arithmetic: when does (day, hour, minute 0) next occur?

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use dutyroll_core::TriggerSlot;

/// The first occurrence of `slot` strictly after `after`.
pub fn next_weekly_run(slot: TriggerSlot, after: NaiveDateTime) -> NaiveDateTime {
    let today = after.date();
    let current_day = today.weekday().num_days_from_monday();
    let days_ahead = (slot.day() + 7 - current_day) % 7;
    let time = NaiveTime::from_hms_opt(slot.hour(), 0, 0).unwrap_or(NaiveTime::MIN);

    let candidate = (today + Duration::days(days_ahead as i64)).and_time(time);
    if candidate > after {
        candidate
    } else {
        candidate + Duration::weeks(1)
    }
}
