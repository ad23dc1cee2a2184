//! Startup reconciliation
//!
//! One-shot procedure run before the HTTP listener starts: read the live
//! device state, load the mode registry against it, and force the device
//! back onto the configured `normal` profile when the two disagree. The
//! configuration is the source of truth; the device state is a cache that
//! may have drifted across power cycles or manual adjustment.

use gea_bus::DeviceBus;
use tracing::info;

use crate::controller::ModeController;
use crate::error::{HeaterSrvError, Result};
use crate::modes::{HeaterMode, NORMAL_SLUG};

/// Live device readings taken at startup
#[derive(Debug, Clone, Copy)]
pub struct LiveState {
    pub mode: HeaterMode,
    pub temp: u8,
}

/// Read the configured mode and temperature setpoint from the device.
///
/// Either read failing is fatal for startup; the caller propagates the
/// error and the process exits.
pub async fn read_live_state(bus: &dyn DeviceBus) -> Result<LiveState> {
    let raw = bus
        .read_mode_setting()
        .await
        .map_err(|e| HeaterSrvError::bus(format!("reading initial mode: {e}")))?;
    let mode = HeaterMode::from_device_code(raw)?;
    info!(%mode, raw, "got initial mode");

    let temp = bus
        .read_temp_setting()
        .await
        .map_err(|e| HeaterSrvError::bus(format!("reading initial temperature: {e}")))?;
    info!(temp, "got initial temperature");

    Ok(LiveState { mode, temp })
}

/// Compare the registry's `normal` profile with the live readings and
/// correct drift.
///
/// When the profile was just bootstrapped from these readings, or already
/// matches them, the active mode is recorded directly and no commands are
/// issued. Otherwise the full switch-to-normal batch is queued.
pub async fn reconcile(
    controller: &ModeController,
    bootstrapped: bool,
    live: LiveState,
) -> Result<()> {
    let normal = controller.registry().normal()?;

    if !bootstrapped && (normal.mode != live.mode || normal.temp != live.temp) {
        info!(
            configured_mode = %normal.mode,
            configured_temp = normal.temp,
            live_mode = %live.mode,
            live_temp = live.temp,
            "device state drifted from normal profile, reconciling"
        );
        controller.switch_to_normal().await?;
    } else {
        controller.set_active_mode(NORMAL_SLUG).await;
    }
    Ok(())
}
