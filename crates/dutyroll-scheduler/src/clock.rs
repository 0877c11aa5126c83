//! Wall-clock source for periods and trigger slots.

use chrono::{Local, NaiveDateTime};

/// Local wall-clock time. The engine has a single logical "now" and does
/// not reconcile time zones.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Process-local system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
