//! # Dutyroll Core
//!
//! Types shared by every Dutyroll crate: the roster and assignment model,
//! the store/notifier traits the rotation engine is written against,
//! configuration, and the error type.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DutyrollConfig;
pub use error::{DutyrollError, Result};
pub use traits::{AssignmentStore, Notifier, RosterStore, SettingsStore};
pub use types::{
    AssignmentRecord, Member, NewAssignment, Period, RotationOutcome, Schedule, ScheduleLookup,
    Task, TriggerSlot,
};
