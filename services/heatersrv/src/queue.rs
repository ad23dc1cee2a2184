//! Command queue and backoff engine
//!
//! Holds the ordered batch of pending device commands and drives their
//! sequential execution from a single drain task, so at most one bus call
//! is ever outstanding. Any failure doubles the attempt interval for the
//! whole queue; a fatal failure additionally abandons the offending
//! command. A success resets the interval to its base. The engine goes
//! fully idle when the queue empties; no timer runs while there is no work.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use gea_bus::DeviceBus;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::modes::{HeaterMode, TEMP_MAX_F, TEMP_MIN_F};

/// Retry pacing for queue attempts: doubles on every failure, uncapped,
/// resets to the base interval on success.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base: Duration,
    current: Duration,
}

impl RetryPolicy {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
        }
    }

    /// Delay before the next attempt
    pub fn delay(&self) -> Duration {
        self.current
    }

    pub fn record_success(&mut self) {
        self.current = self.base;
    }

    pub fn record_failure(&mut self) {
        self.current = self.current.saturating_mul(2);
    }
}

/// A named unit of work against the device
#[derive(Debug, Clone)]
pub struct Command {
    pub description: String,
    pub kind: CommandKind,
}

#[derive(Debug, Clone)]
pub enum CommandKind {
    /// Write the operating mode
    SetMode(HeaterMode),
    /// Write the tank temperature setpoint, validated at apply time
    SetTemperature(u8),
    /// Record the active mode slug in memory; cannot fail, queued so the
    /// bookkeeping stays ordered behind the device writes
    RecordActiveMode(String),
}

impl Command {
    pub fn set_mode(mode: HeaterMode) -> Self {
        Self {
            description: format!("Set mode to {mode}"),
            kind: CommandKind::SetMode(mode),
        }
    }

    pub fn set_temperature(temp_f: u8) -> Self {
        Self {
            description: format!("Set temperature to {temp_f}"),
            kind: CommandKind::SetTemperature(temp_f),
        }
    }

    pub fn record_active_mode(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            description: format!("Record active mode: {slug}"),
            kind: CommandKind::RecordActiveMode(slug),
        }
    }
}

/// Failure classification for command execution
#[derive(Debug, Error)]
pub enum CommandFailure {
    /// Retried indefinitely with backoff
    #[error("{0}")]
    Transient(String),
    /// The command is abandoned; backoff still increases
    #[error("{0} (fatal)")]
    Fatal(String),
}

impl CommandFailure {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandFailure::Fatal(_))
    }
}

/// Effect of a successfully executed command, committed by the drain task
enum CommandOutcome {
    Applied,
    ActiveMode(String),
}

struct QueueState {
    items: VecDeque<Command>,
    /// Bumped on every batch replacement; completions from a superseded
    /// generation are discarded instead of mutating the new batch
    generation: u64,
    policy: RetryPolicy,
}

/// Cloneable handle over the shared queue state
#[derive(Clone)]
pub struct QueueEngine {
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
}

impl QueueEngine {
    pub fn new(base_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::new(),
                generation: 0,
                policy: RetryPolicy::new(base_interval),
            })),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Atomically replace the queue's entire contents with `batch`.
    ///
    /// An execution already in flight against the previous contents is not
    /// cancelled; its completion is dropped by the generation guard.
    pub async fn replace_all(&self, batch: Vec<Command>) {
        let mut state = self.state.lock().await;
        state.items = batch.into();
        state.generation = state.generation.wrapping_add(1);
        debug!(
            pending = state.items.len(),
            generation = state.generation,
            "queue batch installed"
        );
        drop(state);
        self.wake.notify_one();
    }

    /// Number of commands still pending
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Spawn the drain task that executes queued commands against `bus`.
    ///
    /// `active_mode` receives the slug carried by `RecordActiveMode`
    /// commands once they commit.
    pub fn spawn_drain(
        &self,
        bus: Arc<dyn DeviceBus>,
        active_mode: Arc<RwLock<Option<String>>>,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.drain(bus, active_mode).await })
    }

    async fn drain(self, bus: Arc<dyn DeviceBus>, active_mode: Arc<RwLock<Option<String>>>) {
        loop {
            let delay = {
                let state = self.state.lock().await;
                if state.items.is_empty() {
                    None
                } else {
                    Some(state.policy.delay())
                }
            };

            let Some(delay) = delay else {
                debug!("queue empty, sleeping");
                self.wake.notified().await;
                continue;
            };

            // The pending attempt timer. At most one exists because this
            // task is the only place that sleeps on the queue.
            tokio::time::sleep(delay).await;

            let snapshot = {
                let state = self.state.lock().await;
                state
                    .items
                    .front()
                    .cloned()
                    .map(|command| (command, state.generation))
            };
            let Some((command, generation)) = snapshot else {
                continue;
            };

            // No lock held across the bus call: replace_all stays
            // non-blocking while a command is in flight.
            let result = execute(&command, bus.as_ref()).await;

            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!(
                    command = %command.description,
                    "batch replaced mid-flight, dropping stale completion"
                );
                continue;
            }

            match result {
                Ok(outcome) => {
                    info!("[SUCCESS] {}", command.description);
                    state.items.pop_front();
                    state.policy.record_success();
                    drop(state);
                    if let CommandOutcome::ActiveMode(slug) = outcome {
                        *active_mode.write().await = Some(slug);
                    }
                }
                Err(failure) => {
                    warn!("[ERROR] '{}': {}", command.description, failure);
                    if failure.is_fatal() {
                        state.items.pop_front();
                    }
                    state.policy.record_failure();
                }
            }
        }
    }
}

async fn execute(
    command: &Command,
    bus: &dyn DeviceBus,
) -> std::result::Result<CommandOutcome, CommandFailure> {
    match &command.kind {
        CommandKind::SetMode(mode) => {
            bus.write_mode(mode.code())
                .await
                .map_err(|e| CommandFailure::Transient(e.to_string()))?;
            Ok(CommandOutcome::Applied)
        }
        CommandKind::SetTemperature(temp_f) => {
            if !(TEMP_MIN_F..=TEMP_MAX_F).contains(temp_f) {
                // Rejected before any bus contact.
                return Err(CommandFailure::Fatal(format!(
                    "only temperatures from {TEMP_MIN_F}-{TEMP_MAX_F} allowed, got {temp_f}"
                )));
            }
            bus.write_tank_temp(*temp_f)
                .await
                .map_err(|e| CommandFailure::Transient(e.to_string()))?;
            Ok(CommandOutcome::Applied)
        }
        CommandKind::RecordActiveMode(slug) => Ok(CommandOutcome::ActiveMode(slug.clone())),
    }
}
