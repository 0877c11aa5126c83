//! Seams between the rotation engine and its collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AssignmentRecord, Member, NewAssignment, Period, Task};

/// Read access to the roster. Both lists come back ordered by name.
pub trait RosterStore: Send + Sync {
    fn active_members(&self) -> Result<Vec<Member>>;
    fn active_tasks(&self) -> Result<Vec<Task>>;
}

/// Period-indexed assignment storage.
pub trait AssignmentStore: Send + Sync {
    /// Delete every assignment for `period`. Returns the number removed.
    fn clear(&self, period: Period) -> Result<usize>;

    fn bulk_insert(&self, rows: &[NewAssignment]) -> Result<usize>;

    /// `clear` followed by `bulk_insert` as one atomic unit. Readers see
    /// either the old set or the new one, never an empty or mixed period.
    fn replace_period(&self, period: Period, rows: &[NewAssignment]) -> Result<usize>;

    /// Assignments for `period`, ordered by task name then insertion.
    fn assignments_for_period(&self, period: Period) -> Result<Vec<AssignmentRecord>>;

    /// Assignments for one member in `period`, ordered by task name.
    fn member_assignments(&self, external_id: i64, period: Period)
    -> Result<Vec<AssignmentRecord>>;
}

/// String key/value settings overriding configured defaults.
pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

/// Delivers formatted text to people.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Send to the shared destination (the group chat).
    async fn deliver(&self, text: &str) -> Result<()>;

    /// Send a direct message to one member.
    async fn deliver_to(&self, recipient: i64, text: &str) -> Result<()>;
}
