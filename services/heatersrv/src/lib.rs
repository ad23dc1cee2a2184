//! Hybrid water-heater mode control service
//!
//! Drives the operating mode of a GE GeoSpring-style water heater over the
//! appliance bus: a retrying command queue, a mode-switch state machine
//! with timed reversion to the `normal` profile, and startup
//! reconciliation of device state against configuration.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod modes;
pub mod queue;

pub use config::Config;
pub use controller::ModeController;
pub use error::{HeaterSrvError, Result};
pub use modes::{HeaterMode, ModeProfile, ModeRegistry, NORMAL_SLUG};
pub use queue::{Command, QueueEngine, RetryPolicy};
