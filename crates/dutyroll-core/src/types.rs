//! Roster, period and assignment types.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DutyrollError, Result};

/// A person on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Row id in the roster store.
    pub id: i64,
    /// Stable external identity (chat user id).
    pub external_id: i64,
    /// Display name used in schedules.
    pub name: String,
    pub username: Option<String>,
    /// Inactive members keep their history but are skipped by rotations.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A recurring duty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    /// Unique task name.
    pub name: String,
    /// Headcount per period, always >= 1.
    pub required_people: u32,
    pub active: bool,
}

/// One rotation cycle: an ISO-8601 week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub week: u32,
    pub year: i32,
}

impl Period {
    pub fn new(week: u32, year: i32) -> Self {
        Self { week, year }
    }

    /// The ISO week containing `date`. Around New Year the ISO year can
    /// differ from the calendar year.
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            week: iso.week(),
            year: iso.year(),
        }
    }

    /// The period containing a local wall-clock instant.
    pub fn containing(at: NaiveDateTime) -> Self {
        Self::from_date(at.date())
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.week, self.year)
    }
}

/// An assignment produced by the algorithm, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub member_id: i64,
    pub task_id: i64,
    pub period: Period,
}

/// A persisted assignment joined with its member and task names.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRecord {
    pub id: i64,
    pub member_external_id: i64,
    pub member_name: String,
    pub task_name: String,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}

/// Task name -> assigned member names, ordered by task name.
///
/// Task names are unique keys; member lists keep assignment order and may
/// repeat a name when members are scarce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    tasks: BTreeMap<String, Vec<String>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `task` has an entry, even if nobody ends up assigned.
    pub fn add_task(&mut self, task: &str) {
        self.tasks.entry(task.to_string()).or_default();
    }

    /// Append `member` to `task`'s list.
    pub fn push(&mut self, task: &str, member: &str) {
        self.tasks
            .entry(task.to_string())
            .or_default()
            .push(member.to_string());
    }

    pub fn members_for(&self, task: &str) -> Option<&[String]> {
        self.tasks.get(task).map(Vec::as_slice)
    }

    /// Iterate tasks in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tasks.iter().map(|(t, m)| (t.as_str(), m.as_slice()))
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Total assigned slots across all tasks.
    pub fn total_assignments(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }
}

impl FromIterator<AssignmentRecord> for Schedule {
    fn from_iter<I: IntoIterator<Item = AssignmentRecord>>(iter: I) -> Self {
        let mut schedule = Schedule::new();
        for record in iter {
            schedule.push(&record.task_name, &record.member_name);
        }
        schedule
    }
}

/// Result of one rotation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    Assigned(Schedule),
    /// No active members; the period was cleared and nothing assigned.
    EmptyMembers,
    /// No active tasks; the period was cleared and nothing assigned.
    EmptyTasks,
}

impl RotationOutcome {
    pub fn schedule(&self) -> Option<&Schedule> {
        match self {
            RotationOutcome::Assigned(s) => Some(s),
            _ => None,
        }
    }
}

/// Result of reading the current period's schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleLookup {
    Current(Schedule),
    /// No rotation has run for this period yet.
    NoScheduleYet,
}

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Weekly firing slot: day 0 = Monday .. 6 = Sunday, hour 0..=23, minute 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerSlot {
    day: u32,
    hour: u32,
}

impl TriggerSlot {
    pub fn new(day: u32, hour: u32) -> Result<Self> {
        if day > 6 || hour > 23 {
            return Err(DutyrollError::InvalidSlot { day, hour });
        }
        Ok(Self { day, hour })
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn day_name(&self) -> &'static str {
        DAY_NAMES[self.day as usize]
    }
}

impl Default for TriggerSlot {
    fn default() -> Self {
        Self { day: 0, hour: 9 }
    }
}

impl std::fmt::Display for TriggerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}:00", self.day_name(), self.hour)
    }
}
