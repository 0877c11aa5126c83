//! Rotation Engine — recomputes and persists one period's assignments.
//! Manual shuffles and the weekly trigger share `run_rotation`; runs are
//! serialized so two overlapping rotations never interleave their writes.

use std::sync::{Arc, Mutex};

use dutyroll_core::{
    AssignmentRecord, AssignmentStore, DutyrollError, Period, Result, RosterStore, RotationOutcome,
    Schedule, ScheduleLookup,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::assignment;
use crate::clock::{Clock, SystemClock};

/// Orchestrates rotations over a roster and an assignment store.
pub struct RotationEngine {
    roster: Arc<dyn RosterStore>,
    store: Arc<dyn AssignmentStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    rotation_lock: tokio::sync::Mutex<()>,
}

impl RotationEngine {
    /// Engine on the system clock with an entropy-seeded rng.
    pub fn new(roster: Arc<dyn RosterStore>, store: Arc<dyn AssignmentStore>) -> Self {
        Self {
            roster,
            store,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_entropy()),
            rotation_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Deterministic shuffles, for tests and reproducible backfills.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn current_period(&self) -> Period {
        Period::containing(self.clock.now())
    }

    /// Reshuffle the current period.
    pub async fn run_rotation(&self) -> Result<RotationOutcome> {
        self.run_rotation_for(self.current_period()).await
    }

    /// Replace `period`'s assignments with a fresh shuffle of the active
    /// roster. With no active members or tasks the period is left empty.
    pub async fn run_rotation_for(&self, period: Period) -> Result<RotationOutcome> {
        let _guard = self.rotation_lock.lock().await;

        let members = self.roster.active_members()?;
        let tasks = self.roster.active_tasks()?;

        let (outcome, rows) = if members.is_empty() {
            (RotationOutcome::EmptyMembers, Vec::new())
        } else if tasks.is_empty() {
            (RotationOutcome::EmptyTasks, Vec::new())
        } else {
            let plan = {
                let mut rng = self
                    .rng
                    .lock()
                    .map_err(|e| DutyrollError::Other(format!("rng lock poisoned: {e}")))?;
                assignment::assign(&members, &tasks, period, &mut *rng)
            };

            let mut schedule = Schedule::new();
            for task in &tasks {
                schedule.add_task(&task.name);
            }
            for slot in &plan {
                schedule.push(&slot.task.name, &slot.member.name);
            }
            let rows = plan.iter().map(|p| p.to_row()).collect::<Vec<_>>();
            (RotationOutcome::Assigned(schedule), rows)
        };

        self.store.replace_period(period, &rows)?;

        match &outcome {
            RotationOutcome::Assigned(schedule) => tracing::info!(
                "🔀 Rotation for week {}: {} assignments across {} tasks ({} members)",
                period,
                rows.len(),
                schedule.len(),
                members.len()
            ),
            RotationOutcome::EmptyMembers => {
                tracing::info!("Rotation for week {} skipped: no active members", period)
            }
            RotationOutcome::EmptyTasks => {
                tracing::info!("Rotation for week {} skipped: no active tasks", period)
            }
        }
        Ok(outcome)
    }

    /// The current period's schedule, if a rotation has run.
    pub fn get_current_schedule(&self) -> Result<ScheduleLookup> {
        self.schedule_for(self.current_period())
    }

    pub fn schedule_for(&self, period: Period) -> Result<ScheduleLookup> {
        let records = self.store.assignments_for_period(period)?;
        if records.is_empty() {
            return Ok(ScheduleLookup::NoScheduleYet);
        }
        Ok(ScheduleLookup::Current(records.into_iter().collect()))
    }

    /// Raw assignment records for the current period.
    pub fn current_assignments(&self) -> Result<Vec<AssignmentRecord>> {
        self.store.assignments_for_period(self.current_period())
    }

    /// Task names assigned to one member this period, in task-name order.
    /// A task appears once per slot the member holds in it.
    pub fn get_assignments_for(&self, external_id: i64) -> Result<Vec<String>> {
        let records = self
            .store
            .member_assignments(external_id, self.current_period())?;
        Ok(records.into_iter().map(|r| r.task_name).collect())
    }
}
