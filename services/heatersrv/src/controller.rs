//! Mode-switch state machine
//!
//! Owns the single active-mode identifier and the one-shot expiration timer
//! that reverts the appliance to the `normal` profile once a timed mode
//! window runs out. Every switch installs the same three-command batch:
//! write the mode, write the setpoint, record the active slug.
//!
//! Switches and expirations are serialized through the timer slot mutex.
//! Each switch bumps the slot epoch; a fired timer re-checks its epoch
//! under the lock before reverting, so an expiration that lost the race
//! against a newer switch becomes a no-op instead of clobbering it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{HeaterSrvError, Result};
use crate::modes::{ModeRegistry, NORMAL_SLUG};
use crate::queue::{Command, QueueEngine};

/// Expiration timer state. The epoch identifies the switch that armed the
/// current timer; it advances on every switch and cancellation.
#[derive(Default)]
struct TimerSlot {
    epoch: u64,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    registry: Arc<ModeRegistry>,
    queue: QueueEngine,
    active_mode: Arc<RwLock<Option<String>>>,
    /// At most one expiration timer is outstanding; arming replaces and
    /// aborts the previous one.
    timer: Mutex<TimerSlot>,
}

/// Cloneable handle over the controller state
#[derive(Clone)]
pub struct ModeController {
    inner: Arc<Inner>,
}

impl ModeController {
    pub fn new(
        registry: Arc<ModeRegistry>,
        queue: QueueEngine,
        active_mode: Arc<RwLock<Option<String>>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                queue,
                active_mode,
                timer: Mutex::new(TimerSlot::default()),
            }),
        }
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.inner.registry
    }

    pub async fn active_mode(&self) -> Option<String> {
        self.inner.active_mode.read().await.clone()
    }

    /// Set the active slug directly, bypassing the queue. Used by startup
    /// reconciliation when the device already matches the normal profile.
    pub async fn set_active_mode(&self, slug: &str) {
        *self.inner.active_mode.write().await = Some(slug.to_string());
    }

    /// Switch the appliance to the named profile.
    ///
    /// Unknown slugs fail closed with a `ModeNotFound` error before anything
    /// is queued. A pending expiration timer is always cancelled before the
    /// new batch is installed.
    pub async fn switch_to_mode(&self, slug: &str) -> Result<()> {
        let mut slot = self.inner.timer.lock().await;
        self.switch_locked(&mut slot, slug).await
    }

    pub async fn switch_to_normal(&self) -> Result<()> {
        self.switch_to_mode(NORMAL_SLUG).await
    }

    /// Control-surface entry point: switch to the profile and, when it
    /// carries a duration, arm the revert-to-normal timer. Both happen
    /// under one slot lock so no expiration can interleave.
    pub async fn activate(&self, slug: &str) -> Result<()> {
        let mut slot = self.inner.timer.lock().await;
        self.switch_locked(&mut slot, slug).await?;
        let duration_hours = self.inner.registry.get(slug).and_then(|p| p.duration_hours);
        if let Some(hours) = duration_hours {
            self.arm_locked(&mut slot, hours);
        }
        Ok(())
    }

    /// Arm the single-shot expiration timer for `hours`, cancelling any
    /// previously armed one. `hours` comes from a registry profile and is
    /// positive and finite by load-time validation.
    pub async fn arm_expiration(&self, hours: f64) {
        let mut slot = self.inner.timer.lock().await;
        self.arm_locked(&mut slot, hours);
    }

    pub async fn cancel_expiration(&self) {
        let mut slot = self.inner.timer.lock().await;
        slot.epoch = slot.epoch.wrapping_add(1);
        if let Some(timer) = slot.handle.take() {
            timer.abort();
        }
    }

    /// Whether an expiration timer is currently armed
    pub async fn expiration_pending(&self) -> bool {
        self.inner.timer.lock().await.handle.is_some()
    }

    async fn switch_locked(&self, slot: &mut TimerSlot, slug: &str) -> Result<()> {
        let profile = self
            .inner
            .registry
            .get(slug)
            .ok_or_else(|| HeaterSrvError::mode_not_found(slug))?;

        slot.epoch = slot.epoch.wrapping_add(1);
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }

        info!(slug, mode = %profile.mode, temp = profile.temp, "switching mode");
        self.inner
            .queue
            .replace_all(vec![
                Command::set_mode(profile.mode),
                Command::set_temperature(profile.temp),
                Command::record_active_mode(slug),
            ])
            .await;
        Ok(())
    }

    fn arm_locked(&self, slot: &mut TimerSlot, hours: f64) {
        let delay = Duration::from_secs_f64(hours * 3600.0);
        let epoch = slot.epoch;
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.expire(epoch).await;
        });
        if let Some(previous) = slot.handle.replace(handle) {
            previous.abort();
        }
    }

    /// Revert to `normal` after a timed window, unless a later switch
    /// advanced the epoch while this timer was in flight.
    async fn expire(&self, epoch: u64) {
        let mut slot = self.inner.timer.lock().await;
        if slot.epoch != epoch {
            debug!("expiration superseded by a later switch, ignoring");
            return;
        }
        slot.handle = None;
        info!("mode window expired, reverting to normal");
        if let Err(e) = self.switch_locked(&mut slot, NORMAL_SLUG).await {
            error!("failed to revert to normal mode: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::HeaterMode;
    use gea_bus::{BusCall, MockBus};
    use tempfile::tempdir;

    const MODES_TOML: &str = "[normal]\nmode = \"hybrid\"\ntemp = 120\n\n\
         [heat-pump]\nmode = \"heat-pump\"\ntemp = 130\nduration_hours = 4.0\n\n\
         [boost]\nmode = \"high-demand\"\ntemp = 140\nduration_hours = 0.5\n";

    fn controller() -> (ModeController, Arc<MockBus>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modes.toml");
        std::fs::write(&path, MODES_TOML).unwrap();
        let (registry, _) = ModeRegistry::load(&path, HeaterMode::Hybrid, 120).unwrap();

        let bus = Arc::new(MockBus::with_readings(1, 120));
        let active = Arc::new(RwLock::new(Some(NORMAL_SLUG.to_string())));
        let queue = QueueEngine::new(Duration::from_millis(50));
        queue.spawn_drain(bus.clone(), active.clone());
        (
            ModeController::new(Arc::new(registry), queue, active),
            bus,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stale_expiration_does_not_revert_newer_switch() {
        let (controller, bus) = controller();

        controller.activate("boost").await.unwrap();
        let stale_epoch = controller.inner.timer.lock().await.epoch;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(controller.active_mode().await.as_deref(), Some("boost"));

        // A newer switch lands while the boost window is still armed.
        controller.activate("heat-pump").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        // A late firing of the superseded timer must leave the newer
        // switch untouched.
        controller.expire(stale_epoch).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            controller.active_mode().await.as_deref(),
            Some("heat-pump")
        );
        assert_eq!(bus.calls().last(), Some(&BusCall::WriteTankTemp(130)));
        assert!(controller.expiration_pending().await);
    }

    #[tokio::test(start_paused = true)]
    async fn current_expiration_reverts_to_normal() {
        let (controller, bus) = controller();

        controller.activate("boost").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1900)).await;

        assert_eq!(
            controller.active_mode().await.as_deref(),
            Some(NORMAL_SLUG)
        );
        assert!(!controller.expiration_pending().await);
        assert_eq!(bus.calls().last(), Some(&BusCall::WriteTankTemp(120)));
    }
}
