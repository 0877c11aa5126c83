//! # Dutyroll Scheduler
//!
//! Weekly duty rotation: assigns the active roster to active tasks, keeps
//! exactly one assignment set per ISO week, and re-runs the shuffle plus a
//! group reminder on a configurable weekly slot.
//!
//! ## Architecture
//! ```text
//! PeriodicTrigger (tokio timer, one worker task)
//!   └── on slot → RotationEngine::run_rotation
//!                   ├── RosterStore: active members / tasks
//!                   ├── assignment::assign (seedable rng)
//!                   └── AssignmentStore::replace_period (one transaction)
//!                 → Notifier::deliver (Telegram or log)
//! ```

pub mod assignment;
pub mod clock;
pub mod cron;
pub mod dispatch;
pub mod engine;
pub mod format;
pub mod persistence;
pub mod service;
pub mod trigger;

pub use clock::{Clock, SystemClock};
pub use dispatch::{LogNotifier, TelegramNotifier};
pub use engine::RotationEngine;
pub use persistence::RotaDb;
pub use service::RotationService;
pub use trigger::{PeriodicTrigger, TriggerJob, TriggerState};
