//! Rotation service — the bootstrapped engine plus its weekly trigger.
//!
//! ```text
//! PeriodicTrigger ──fire──▶ WeeklyRotationJob
//!                              ├── RotationEngine::run_rotation
//!                              └── Notifier::deliver (after commit, failures logged)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dutyroll_core::{Notifier, Result, SettingsStore, TriggerSlot};

use crate::clock::Clock;
use crate::dispatch::deliver_logged;
use crate::engine::RotationEngine;
use crate::format;
use crate::persistence::{SETTING_NOTIFICATION_DAY, SETTING_NOTIFICATION_HOUR};
use crate::trigger::{PeriodicTrigger, TriggerJob};

/// Reshuffle, then announce the new schedule to the group.
struct WeeklyRotationJob {
    engine: Arc<RotationEngine>,
    notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl TriggerJob for WeeklyRotationJob {
    async fn fire(&self, _slot: TriggerSlot) -> Result<()> {
        let period = self.engine.current_period();
        let outcome = self.engine.run_rotation_for(period).await?;
        deliver_logged(self.notifier.as_ref(), &format::rotation_reminder(&outcome, period)).await;
        Ok(())
    }
}

/// Owns the engine, the trigger and the settings that drive it.
pub struct RotationService {
    engine: Arc<RotationEngine>,
    settings: Arc<dyn SettingsStore>,
    notifier: Arc<dyn Notifier>,
    trigger: PeriodicTrigger,
    defaults: TriggerSlot,
}

impl RotationService {
    pub fn new(
        engine: Arc<RotationEngine>,
        settings: Arc<dyn SettingsStore>,
        notifier: Arc<dyn Notifier>,
        defaults: TriggerSlot,
    ) -> Self {
        let job = Arc::new(WeeklyRotationJob {
            engine: engine.clone(),
            notifier: notifier.clone(),
        });
        Self {
            engine,
            settings,
            notifier,
            trigger: PeriodicTrigger::new(job),
            defaults,
        }
    }

    /// Clock used by the trigger when computing firing times.
    pub fn with_trigger_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.trigger = self.trigger.with_clock(clock);
        self
    }

    pub fn engine(&self) -> &Arc<RotationEngine> {
        &self.engine
    }

    pub fn trigger(&self) -> &PeriodicTrigger {
        &self.trigger
    }

    /// Stored day/hour, each falling back to the compiled default when
    /// missing or unusable.
    pub fn resolve_slot(&self) -> Result<TriggerSlot> {
        let day = self.setting_or(SETTING_NOTIFICATION_DAY, self.defaults.day())?;
        let hour = self.setting_or(SETTING_NOTIFICATION_HOUR, self.defaults.hour())?;
        TriggerSlot::new(day, hour).or_else(|e| {
            tracing::warn!("⚠️ Stored trigger slot rejected ({e}); using {}", self.defaults);
            Ok(self.defaults)
        })
    }

    fn setting_or(&self, key: &str, default: u32) -> Result<u32> {
        Ok(match self.settings.get_setting(key)? {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("⚠️ Ignoring setting {}={:?}", key, raw);
                default
            }),
            None => default,
        })
    }

    /// Arm the weekly trigger from settings.
    pub fn start(&self) -> Result<TriggerSlot> {
        let slot = self.resolve_slot()?;
        self.trigger.start(slot)?;
        Ok(slot)
    }

    /// Persist a new reminder slot and, if the trigger is running, move it.
    pub fn configure_trigger(&self, day: u32, hour: u32) -> Result<TriggerSlot> {
        let slot = TriggerSlot::new(day, hour)?;
        self.settings
            .set_setting(SETTING_NOTIFICATION_DAY, &slot.day().to_string())?;
        self.settings
            .set_setting(SETTING_NOTIFICATION_HOUR, &slot.hour().to_string())?;
        if self.trigger.is_configured() {
            self.trigger.reconfigure(slot)?;
        }
        tracing::info!("Reminder slot set to {}", slot);
        Ok(slot)
    }

    /// Send the current schedule to the group now.
    pub async fn send_weekly_notification(&self) -> Result<bool> {
        let period = self.engine.current_period();
        let lookup = self.engine.get_current_schedule()?;
        Ok(deliver_logged(self.notifier.as_ref(), &format::weekly_reminder(&lookup, period)).await)
    }

    /// Direct-message every assigned member their tasks for this period.
    /// Returns how many messages were delivered.
    pub async fn notify_members(&self) -> Result<usize> {
        let mut by_member: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for record in self.engine.current_assignments()? {
            by_member
                .entry(record.member_external_id)
                .or_default()
                .push(record.task_name);
        }

        let mut delivered = 0;
        for (member, tasks) in &by_member {
            let Some(text) = format::member_tasks(tasks) else {
                continue;
            };
            match self.notifier.deliver_to(*member, &text).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("⚠️ Failed to notify member {}: {}", member, e),
            }
        }
        Ok(delivered)
    }

    /// Stop the trigger, letting an in-flight firing finish.
    pub async fn shutdown(&self) {
        self.trigger.stop().await;
    }
}
