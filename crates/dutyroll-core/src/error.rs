//! Error type shared across Dutyroll crates.

/// Errors produced by the rotation engine and its collaborators.
///
/// Expected input states (no members, no tasks, no schedule yet) are
/// result variants, not errors.
#[derive(Debug, thiserror::Error)]
pub enum DutyrollError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("invalid trigger slot: day {day} (0-6), hour {hour} (0-23)")]
    InvalidSlot { day: u32, hour: u32 },

    #[error("roster error: {0}")]
    Roster(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DutyrollError>;
