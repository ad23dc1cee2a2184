//! Scripted in-memory device
//!
//! Behaves like a bound water heater with programmable readings and
//! injectable failures. Used by service tests and simulated deployments.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{BusError, DeviceBus, EnergyReading, Result};

/// One recorded call against the mock device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    WriteMode(u8),
    WriteTankTemp(u8),
    ReadModeSetting,
    ReadTempSetting,
    ReadTempCurrent,
    ReadKwh,
}

#[derive(Default)]
struct Failures {
    write_mode: VecDeque<BusError>,
    write_tank_temp: VecDeque<BusError>,
    read_mode_setting: VecDeque<BusError>,
    read_temp_setting: VecDeque<BusError>,
    read_temp_current: VecDeque<BusError>,
    read_kwh: VecDeque<BusError>,
}

struct Inner {
    /// Raw mode code as the device reports it (one greater than logical)
    raw_mode: u8,
    temp_setting: u8,
    temp_current: u8,
    energy_ws: f64,
    failures: Failures,
    calls: Vec<(Instant, BusCall)>,
}

/// In-memory [`DeviceBus`] implementation
pub struct MockBus {
    inner: Mutex<Inner>,
}

impl MockBus {
    /// Device in hybrid mode at 120°F
    pub fn new() -> Self {
        Self::with_readings(1, 120)
    }

    /// Device reporting the given raw mode code and temperature setpoint
    pub fn with_readings(raw_mode: u8, temp_setting: u8) -> Self {
        Self {
            inner: Mutex::new(Inner {
                raw_mode,
                temp_setting,
                temp_current: temp_setting,
                energy_ws: 0.0,
                failures: Failures::default(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_temp_current(&self, temp_f: u8) {
        self.lock().temp_current = temp_f;
    }

    pub fn set_energy_ws(&self, energy_ws: f64) {
        self.lock().energy_ws = energy_ws;
    }

    /// Queue `n` injected failures for the next `write_mode` calls
    pub fn fail_write_mode(&self, n: usize) {
        let mut inner = self.lock();
        for _ in 0..n {
            inner.failures.write_mode.push_back(injected());
        }
    }

    pub fn fail_write_tank_temp(&self, n: usize) {
        let mut inner = self.lock();
        for _ in 0..n {
            inner.failures.write_tank_temp.push_back(injected());
        }
    }

    pub fn fail_read_mode_setting(&self, n: usize) {
        let mut inner = self.lock();
        for _ in 0..n {
            inner.failures.read_mode_setting.push_back(injected());
        }
    }

    pub fn fail_read_temp_setting(&self, n: usize) {
        let mut inner = self.lock();
        for _ in 0..n {
            inner.failures.read_temp_setting.push_back(injected());
        }
    }

    pub fn fail_read_temp_current(&self, n: usize) {
        let mut inner = self.lock();
        for _ in 0..n {
            inner.failures.read_temp_current.push_back(injected());
        }
    }

    pub fn fail_read_kwh(&self, n: usize) {
        let mut inner = self.lock();
        for _ in 0..n {
            inner.failures.read_kwh.push_back(injected());
        }
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<BusCall> {
        self.lock().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Every call with the instant it was made (respects a paused test clock)
    pub fn call_log(&self) -> Vec<(Instant, BusCall)> {
        self.lock().calls.clone()
    }

    fn record(inner: &mut Inner, call: BusCall) {
        inner.calls.push((Instant::now(), call));
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

fn injected() -> BusError {
    BusError::device("injected failure")
}

#[async_trait]
impl DeviceBus for MockBus {
    async fn write_mode(&self, code: u8) -> Result<()> {
        let mut inner = self.lock();
        Self::record(&mut inner, BusCall::WriteMode(code));
        if let Some(err) = inner.failures.write_mode.pop_front() {
            return Err(err);
        }
        // The real device stores and reports one greater than the logical code.
        inner.raw_mode = code + 1;
        Ok(())
    }

    async fn write_tank_temp(&self, temp_f: u8) -> Result<()> {
        let mut inner = self.lock();
        Self::record(&mut inner, BusCall::WriteTankTemp(temp_f));
        if let Some(err) = inner.failures.write_tank_temp.pop_front() {
            return Err(err);
        }
        inner.temp_setting = temp_f;
        Ok(())
    }

    async fn read_mode_setting(&self) -> Result<u8> {
        let mut inner = self.lock();
        Self::record(&mut inner, BusCall::ReadModeSetting);
        if let Some(err) = inner.failures.read_mode_setting.pop_front() {
            return Err(err);
        }
        Ok(inner.raw_mode)
    }

    async fn read_temp_setting(&self) -> Result<u8> {
        let mut inner = self.lock();
        Self::record(&mut inner, BusCall::ReadTempSetting);
        if let Some(err) = inner.failures.read_temp_setting.pop_front() {
            return Err(err);
        }
        Ok(inner.temp_setting)
    }

    async fn read_temp_current(&self) -> Result<u8> {
        let mut inner = self.lock();
        Self::record(&mut inner, BusCall::ReadTempCurrent);
        if let Some(err) = inner.failures.read_temp_current.pop_front() {
            return Err(err);
        }
        Ok(inner.temp_current)
    }

    async fn read_kwh(&self) -> Result<EnergyReading> {
        let mut inner = self.lock();
        Self::record(&mut inner, BusCall::ReadKwh);
        if let Some(err) = inner.failures.read_kwh.pop_front() {
            return Err(err);
        }
        Ok(EnergyReading {
            energy_ws: inner.energy_ws,
        })
    }
}
