//! Periodic Trigger — fires a job once a week at a (day, hour) slot.
//!
//! A single worker task sleeps until the next occurrence of the armed slot.
//! The slot lives in a `watch` channel: reconfiguring swaps it in one step
//! and wakes the worker, which re-arms for the new slot before the old one
//! can fire. Sleeps are capped and the wall clock is re-read on waking, so
//! a clock that jumps (DST, NTP) still fires at the slot's wall-clock hour.
//! Stopping lets a firing already in progress run to completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use dutyroll_core::{DutyrollError, Result, TriggerSlot};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::cron;

/// Longest single sleep before the wall clock is consulted again.
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// Work performed at each firing.
#[async_trait]
pub trait TriggerJob: Send + Sync {
    async fn fire(&self, slot: TriggerSlot) -> Result<()>;
}

/// Lifecycle of a [`PeriodicTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Unconfigured,
    Armed(TriggerSlot),
    Stopped,
}

/// Owned weekly scheduler with an explicit start/reconfigure/stop lifecycle.
pub struct PeriodicTrigger {
    job: Arc<dyn TriggerJob>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<TriggerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTrigger {
    pub fn new(job: Arc<dyn TriggerJob>) -> Self {
        let (state, _) = watch::channel(TriggerState::Unconfigured);
        Self {
            job,
            clock: Arc::new(SystemClock),
            state,
            worker: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> TriggerState {
        *self.state.borrow()
    }

    /// True while a slot is armed.
    pub fn is_configured(&self) -> bool {
        matches!(self.state(), TriggerState::Armed(_))
    }

    pub fn slot(&self) -> Option<TriggerSlot> {
        match self.state() {
            TriggerState::Armed(slot) => Some(slot),
            _ => None,
        }
    }

    /// Arm `slot` and spawn the worker. Must be called inside a tokio
    /// runtime. Starting an armed trigger just re-arms it.
    pub fn start(&self, slot: TriggerSlot) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|e| DutyrollError::Config(format!("trigger lock poisoned: {e}")))?;
        let armed = self.state.send_if_modified(|state| match *state {
            TriggerState::Stopped => false,
            _ => {
                *state = TriggerState::Armed(slot);
                true
            }
        });
        if !armed {
            return Err(DutyrollError::Config("trigger has been stopped".into()));
        }

        if worker.is_none() {
            let rx = self.state.subscribe();
            *worker = Some(tokio::spawn(run_worker(
                self.job.clone(),
                self.clock.clone(),
                rx,
            )));
        }
        tracing::info!("⏰ Weekly trigger armed for {}", slot);
        Ok(())
    }

    /// Replace the armed slot. The previous slot never fires afterwards.
    pub fn reconfigure(&self, slot: TriggerSlot) -> Result<()> {
        let mut previous = None;
        self.state.send_if_modified(|state| match *state {
            TriggerState::Armed(old) => {
                previous = Some(old);
                *state = TriggerState::Armed(slot);
                true
            }
            _ => false,
        });
        match previous {
            Some(old) => {
                tracing::info!("⏰ Weekly trigger moved from {} to {}", old, slot);
                Ok(())
            }
            None => self.start(slot),
        }
    }

    /// Stop firing and wait for the worker to exit.
    pub async fn stop(&self) {
        self.state.send_replace(TriggerState::Stopped);
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!("⚠️ Trigger worker ended abnormally: {e}");
        }
    }
}

async fn run_worker(
    job: Arc<dyn TriggerJob>,
    clock: Arc<dyn Clock>,
    mut rx: watch::Receiver<TriggerState>,
) {
    let mut last_fired: Option<NaiveDateTime> = None;
    let mut planned: Option<NaiveDateTime> = None;

    loop {
        let state = *rx.borrow_and_update();
        let slot = match state {
            TriggerState::Stopped => break,
            TriggerState::Unconfigured => {
                if rx.changed().await.is_err() {
                    break;
                }
                continue;
            }
            TriggerState::Armed(slot) => slot,
        };

        let now = clock.now();
        let after = last_fired.map_or(now, |fired| fired.max(now));
        let due = cron::next_weekly_run(slot, after);
        let wait = (due - now).to_std().unwrap_or_default();
        if planned != Some(due) {
            tracing::debug!("Next weekly firing at {} ({}s)", due, wait.as_secs());
            planned = Some(due);
        }

        tokio::select! {
            biased;
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(wait.min(MAX_SLEEP)) => {}
        }

        if *rx.borrow() != TriggerState::Armed(slot) || clock.now() < due {
            continue;
        }

        tracing::info!("🔔 Weekly trigger firing ({})", slot);
        let job = job.clone();
        match tokio::spawn(async move { job.fire(slot).await }).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("⚠️ Weekly firing failed: {e}"),
            Err(e) => tracing::warn!("⚠️ Weekly firing panicked: {e}"),
        }
        last_fired = Some(due);
    }

    tracing::info!("⏰ Weekly trigger stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const DAY: u64 = 24 * 3600;

    /// Wall clock that advances with tokio's (paused) test clock.
    struct TokioClock {
        base: NaiveDateTime,
        start: tokio::time::Instant,
    }

    impl TokioClock {
        fn friday_noon() -> Self {
            Self {
                base: NaiveDate::from_ymd_opt(2026, 10, 16)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
                start: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> NaiveDateTime {
            let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
            self.base + elapsed
        }
    }

    #[derive(Default)]
    struct Recorder {
        fired: Mutex<Vec<TriggerSlot>>,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl TriggerJob for Recorder {
        async fn fire(&self, slot: TriggerSlot) -> Result<()> {
            self.fired.lock().unwrap().push(slot);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(DutyrollError::Storage("database is locked".into()));
            }
            Ok(())
        }
    }

    fn trigger(job: Arc<Recorder>) -> PeriodicTrigger {
        PeriodicTrigger::new(job).with_clock(Arc::new(TokioClock::friday_noon()))
    }

    fn slot(day: u32, hour: u32) -> TriggerSlot {
        TriggerSlot::new(day, hour).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_weekly_at_slot() {
        let job = Arc::new(Recorder::default());
        let trigger = trigger(job.clone());
        trigger.start(slot(0, 9)).unwrap();

        // Monday 09:00 is 2d21h away; two more weeks bring three firings.
        tokio::time::sleep(Duration::from_secs(17 * DAY)).await;
        assert_eq!(job.fired.lock().unwrap().len(), 3);
        trigger.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_replaces_old_slot() {
        let job = Arc::new(Recorder::default());
        let trigger = trigger(job.clone());
        trigger.start(slot(0, 9)).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        trigger.reconfigure(slot(2, 18)).unwrap();
        assert_eq!(trigger.slot(), Some(slot(2, 18)));

        // Old slot (Mon 09:00) would fire within 3 days; new slot is Wed 18:00.
        tokio::time::sleep(Duration::from_secs(10 * DAY)).await;
        let fired = job.fired.lock().unwrap().clone();
        assert_eq!(fired, vec![slot(2, 18)]);
        trigger.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_firings() {
        let job = Arc::new(Recorder::default());
        let trigger = trigger(job.clone());
        trigger.start(slot(4, 13)).unwrap();

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(job.fired.lock().unwrap().len(), 1);

        trigger.stop().await;
        assert_eq!(trigger.state(), TriggerState::Stopped);
        assert!(!trigger.is_configured());

        tokio::time::sleep(Duration::from_secs(30 * DAY)).await;
        assert_eq!(job.fired.lock().unwrap().len(), 1);
        assert!(trigger.start(slot(4, 13)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_firing_stays_armed() {
        let job = Arc::new(Recorder::default());
        job.failures_left.store(1, Ordering::SeqCst);
        let trigger = trigger(job.clone());
        trigger.start(slot(5, 8)).unwrap();

        tokio::time::sleep(Duration::from_secs(9 * DAY)).await;
        assert_eq!(job.fired.lock().unwrap().len(), 2);
        assert!(trigger.is_configured());
        trigger.stop().await;
    }

    #[test]
    fn test_unconfigured_until_started() {
        let trigger = PeriodicTrigger::new(Arc::new(Recorder::default()));
        assert_eq!(trigger.state(), TriggerState::Unconfigured);
        assert!(!trigger.is_configured());
        assert_eq!(trigger.slot(), None);
    }

    /// Follows tokio time, then falls back one hour after the first day.
    struct FallBackClock(TokioClock);

    impl Clock for FallBackClock {
        fn now(&self) -> NaiveDateTime {
            let now = self.0.now();
            if self.0.start.elapsed() >= Duration::from_secs(DAY) {
                now - chrono::Duration::hours(1)
            } else {
                now
            }
        }
    }

    struct WallRecorder {
        clock: Arc<dyn Clock>,
        fired_at: Mutex<Vec<NaiveDateTime>>,
    }

    #[async_trait]
    impl TriggerJob for WallRecorder {
        async fn fire(&self, _slot: TriggerSlot) -> Result<()> {
            self.fired_at.lock().unwrap().push(self.clock.now());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_on_wall_clock_after_clock_falls_back() {
        let clock: Arc<dyn Clock> = Arc::new(FallBackClock(TokioClock::friday_noon()));
        let job = Arc::new(WallRecorder {
            clock: clock.clone(),
            fired_at: Mutex::new(Vec::new()),
        });
        let trigger = PeriodicTrigger::new(job.clone()).with_clock(clock);
        trigger.start(slot(0, 9)).unwrap();

        tokio::time::sleep(Duration::from_secs(4 * DAY)).await;
        let monday_nine = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(*job.fired_at.lock().unwrap(), vec![monday_nine]);
        trigger.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_after_stop_stays_stopped() {
        let trigger = trigger(Arc::new(Recorder::default()));
        trigger.start(slot(0, 9)).unwrap();
        trigger.stop().await;

        assert!(trigger.reconfigure(slot(2, 18)).is_err());
        assert_eq!(trigger.state(), TriggerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reconfigure_racing_stop_never_rearms() {
        for _ in 0..200 {
            let trigger = Arc::new(PeriodicTrigger::new(Arc::new(Recorder::default())));
            trigger.start(slot(0, 9)).unwrap();
            let mover = {
                let trigger = trigger.clone();
                tokio::task::spawn_blocking(move || trigger.reconfigure(slot(2, 18)))
            };

            tokio::time::timeout(Duration::from_secs(5), trigger.stop())
                .await
                .expect("stop did not return");
            let _ = mover.await.unwrap();
            assert_eq!(trigger.state(), TriggerState::Stopped);
        }
    }

    struct SlowJob {
        started: AtomicBool,
        finished: AtomicBool,
    }

    #[async_trait]
    impl TriggerJob for SlowJob {
        async fn fire(&self, _slot: TriggerSlot) -> Result<()> {
            self.started.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_firing() {
        let job = Arc::new(SlowJob {
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });
        let trigger = PeriodicTrigger::new(job.clone())
            .with_clock(Arc::new(TokioClock::friday_noon()));
        trigger.start(slot(4, 13)).unwrap();

        // Poll off the minute grid so we land inside the 30s firing.
        while !job.started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(7)).await;
        }
        assert!(!job.finished.load(Ordering::SeqCst));

        trigger.stop().await;
        assert!(job.finished.load(Ordering::SeqCst));
    }
}
