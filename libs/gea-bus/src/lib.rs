//! Appliance bus client for GE water-heater controllers
//!
//! Exposes the read/write primitives the control service needs as the
//! [`DeviceBus`] trait, together with an HTTP gateway client implementation
//! and a scripted in-memory device for tests and simulated deployments.
//! The framed wire protocol itself lives in the gateway daemon; this crate
//! only speaks to it.

pub mod error;
pub mod http;
pub mod mock;

pub use error::BusError;
pub use http::{BusClientConfig, HttpBusClient};
pub use mock::{BusCall, MockBus};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Accumulated energy counter reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyReading {
    /// Energy consumed, in watt-seconds
    pub energy_ws: f64,
}

/// Read/write primitives of the water-heater controller.
///
/// All calls are asynchronous; callers are expected to keep at most one
/// call outstanding per device at a time.
#[async_trait]
pub trait DeviceBus: Send + Sync {
    /// Command the operating mode. `code` is the logical mode code.
    async fn write_mode(&self, code: u8) -> Result<()>;

    /// Command the tank temperature setpoint in degrees Fahrenheit.
    async fn write_tank_temp(&self, temp_f: u8) -> Result<()>;

    /// Read the configured operating mode.
    ///
    /// Returns the raw device code, which is known to be one greater than
    /// the logical enumeration; callers apply the correction.
    async fn read_mode_setting(&self) -> Result<u8>;

    /// Read the configured temperature setpoint in degrees Fahrenheit.
    async fn read_temp_setting(&self) -> Result<u8>;

    /// Read the current tank temperature in degrees Fahrenheit.
    async fn read_temp_current(&self) -> Result<u8>;

    /// Read the accumulated energy counter.
    async fn read_kwh(&self) -> Result<EnergyReading>;
}
