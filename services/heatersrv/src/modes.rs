//! Operating modes and the mode registry
//!
//! Mode profiles live in a human-editable TOML file, one section per slug.
//! The registry is loaded once at startup; if no `normal` profile is
//! configured, one is synthesized from the live device readings and the
//! whole file is written back, so the format must round-trip losslessly.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HeaterSrvError, Result};

/// Slug of the profile the appliance reverts to
pub const NORMAL_SLUG: &str = "normal";

/// Lowest accepted tank temperature setpoint, °F
pub const TEMP_MIN_F: u8 = 100;

/// Highest accepted tank temperature setpoint, °F
pub const TEMP_MAX_F: u8 = 140;

/// Operating modes of the water heater, in logical code order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaterMode {
    Hybrid,
    Electric,
    HeatPump,
    HighDemand,
}

impl HeaterMode {
    /// Logical mode code sent on the bus
    pub fn code(self) -> u8 {
        match self {
            HeaterMode::Hybrid => 0,
            HeaterMode::Electric => 1,
            HeaterMode::HeatPump => 2,
            HeaterMode::HighDemand => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(HeaterMode::Hybrid),
            1 => Some(HeaterMode::Electric),
            2 => Some(HeaterMode::HeatPump),
            3 => Some(HeaterMode::HighDemand),
            _ => None,
        }
    }

    /// Decode a raw mode code as reported by the device.
    ///
    /// The device reports one greater than the logical enumeration, so the
    /// raw code is decremented before lookup.
    pub fn from_device_code(raw: u8) -> Result<Self> {
        let code = raw
            .checked_sub(1)
            .ok_or_else(|| HeaterSrvError::data(format!("raw device mode code {raw} underflows")))?;
        Self::from_code(code)
            .ok_or_else(|| HeaterSrvError::data(format!("unknown device mode code {raw}")))
    }

    /// Human-readable name for page rendering
    pub fn label(self) -> &'static str {
        match self {
            HeaterMode::Hybrid => "Hybrid",
            HeaterMode::Electric => "Standard Electric",
            HeaterMode::HeatPump => "Heat Pump",
            HeaterMode::HighDemand => "High Demand",
        }
    }
}

impl std::fmt::Display for HeaterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One named mode profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub mode: HeaterMode,
    /// Tank temperature setpoint, °F; range-checked at apply time, not here
    pub temp: u8,
    /// Window after which the appliance reverts to `normal`; when present,
    /// guaranteed positive and finite after [`ModeRegistry::load`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
}

/// Slug → profile mapping, read-only after load
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: BTreeMap<String, ModeProfile>,
}

impl ModeRegistry {
    /// Load the registry from `path`, bootstrapping a `normal` profile from
    /// the live device readings when the file does not configure one.
    ///
    /// Returns the registry and whether bootstrap took place. The bootstrap
    /// write-back happens at most once per missing-normal occurrence.
    pub fn load(path: &Path, live_mode: HeaterMode, live_temp: u8) -> Result<(Self, bool)> {
        let modes: BTreeMap<String, ModeProfile> = if path.exists() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            BTreeMap::new()
        };

        // The file is hand-edited; a zero, negative or non-finite window
        // would make the expiration delay meaningless, so refuse the whole
        // store rather than carry the profile.
        for (slug, profile) in &modes {
            if let Some(hours) = profile.duration_hours {
                if !hours.is_finite() || hours <= 0.0 {
                    return Err(HeaterSrvError::validation(format!(
                        "mode {slug}: duration_hours must be a positive number, got {hours}"
                    )));
                }
            }
        }

        let mut registry = Self { modes };
        let bootstrapped = if registry.modes.contains_key(NORMAL_SLUG) {
            false
        } else {
            info!(
                mode = %live_mode,
                temp = live_temp,
                "no normal profile configured, adopting live device settings"
            );
            registry.modes.insert(
                NORMAL_SLUG.to_string(),
                ModeProfile {
                    mode: live_mode,
                    temp: live_temp,
                    duration_hours: None,
                },
            );
            registry.persist(path)?;
            true
        };

        Ok((registry, bootstrapped))
    }

    fn persist(&self, path: &Path) -> Result<()> {
        let rendered = toml::to_string_pretty(&self.modes)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&ModeProfile> {
        self.modes.get(slug)
    }

    /// The `normal` profile; present by construction after [`load`](Self::load)
    pub fn normal(&self) -> Result<&ModeProfile> {
        self.get(NORMAL_SLUG)
            .ok_or_else(|| HeaterSrvError::mode("registry has no normal profile"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModeProfile)> {
        self.modes.iter()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}
