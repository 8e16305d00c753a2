//! The station's production and fault state machine.
//!
//! [`StationState`] is plain data with pure transitions; locking, the clock
//! and projection live in [`Station`](crate::station::Station).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pressure restored by the release valve and used as the initial value.
pub const NOMINAL_PRESSURE: f64 = 1000.0;

/// Initial energy consumption.
pub const NOMINAL_ENERGY_CONSUMPTION: f64 = 1000.0;

/// Default ideal cycle time in milliseconds.
pub const DEFAULT_CYCLE_TIME_MS: u64 = 5000;

/// Every n-th processed unit puts the station into fault.
pub const FAULT_INTERVAL: u64 = 1000;

/// Every n-th processed unit is discarded.
pub const DISCARD_INTERVAL: u64 = 100;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum StationStatus {
    #[default]
    Ready = 0,
    WorkInProgress = 1,
    Fault = 2,
}

impl StationStatus {
    /// Wire value exposed through the `Status` variable.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(StationStatus::Ready),
            1 => Some(StationStatus::WorkInProgress),
            2 => Some(StationStatus::Fault),
            _ => None,
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StationStatus::Ready => "Ready",
            StationStatus::WorkInProgress => "WorkInProgress",
            StationStatus::Fault => "Fault",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StationError {
    #[error("Machine is in fault state, call reset first!")]
    InvalidTransition { status: StationStatus },
    #[error("counter {counter} would overflow")]
    CounterOverflow { counter: &'static str },
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The station is in fault; nothing changed.
    Halted,
    Faulted,
    Discarded,
    Manufactured,
}

impl TickOutcome {
    /// Whether the tick changed any field.
    pub fn changed(self) -> bool {
        self != TickOutcome::Halted
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationState {
    pub status: StationStatus,
    pub product_serial_number: u64,
    pub manufactured: u64,
    pub discarded: u64,
    pub ideal_cycle_time_ms: u64,
    pub actual_cycle_time_ms: u64,
    pub energy_consumption: f64,
    pub pressure: f64,
    /// Accumulated actual cycle time of ticks that manufactured a unit.
    pub overall_running_time_ms: u64,
    /// Processed-unit count at which the last fault was raised. Keeps a
    /// reset station from faulting again on the same unit.
    #[serde(default)]
    fault_latched_at: Option<u64>,
}

impl Default for StationState {
    fn default() -> Self {
        Self::with_cycle_time(DEFAULT_CYCLE_TIME_MS)
    }
}

impl StationState {
    /// A fresh station whose ideal and actual cycle time are `cycle_time_ms`.
    pub fn with_cycle_time(cycle_time_ms: u64) -> Self {
        Self {
            status: StationStatus::Ready,
            product_serial_number: 0,
            manufactured: 0,
            discarded: 0,
            ideal_cycle_time_ms: cycle_time_ms,
            actual_cycle_time_ms: cycle_time_ms,
            energy_consumption: NOMINAL_ENERGY_CONSUMPTION,
            pressure: NOMINAL_PRESSURE,
            overall_running_time_ms: 0,
            fault_latched_at: None,
        }
    }

    /// Units processed so far: manufactured plus discarded.
    pub fn processed(&self) -> u64 {
        self.manufactured.saturating_add(self.discarded)
    }

    /// Advance production by one cycle.
    ///
    /// With n = manufactured + discarded, a positive n that is a multiple of
    /// 1000 faults once per count (the latch stops a re-fault after reset),
    /// a positive multiple of 100 discards, and anything else manufactures.
    /// The fault check runs before the discard check. On error the state is
    /// unchanged.
    pub fn tick(&mut self) -> Result<TickOutcome, StationError> {
        if self.status == StationStatus::Fault {
            return Ok(TickOutcome::Halted);
        }

        let n = self.processed();
        if n > 0 && n % FAULT_INTERVAL == 0 && self.fault_latched_at != Some(n) {
            self.status = StationStatus::Fault;
            self.fault_latched_at = Some(n);
            return Ok(TickOutcome::Faulted);
        }

        let serial = checked(self.product_serial_number, 1, "ProductSerialNumber")?;
        if n > 0 && n % DISCARD_INTERVAL == 0 && n % FAULT_INTERVAL != 0 {
            self.discarded = checked(self.discarded, 1, "NumberOfDiscardedProducts")?;
            self.product_serial_number = serial;
            return Ok(TickOutcome::Discarded);
        }

        let manufactured = checked(self.manufactured, 1, "NumberOfManufacturedProducts")?;
        let running = checked(
            self.overall_running_time_ms,
            self.actual_cycle_time_ms,
            "OverallRunningTime",
        )?;
        self.manufactured = manufactured;
        self.product_serial_number = serial;
        self.overall_running_time_ms = running;
        Ok(TickOutcome::Manufactured)
    }

    /// Start working on `serial`. Refused while in fault.
    pub fn execute(&mut self, serial: u64) -> Result<(), StationError> {
        if self.status == StationStatus::Fault {
            return Err(StationError::InvalidTransition {
                status: self.status,
            });
        }
        self.product_serial_number = serial;
        self.status = StationStatus::WorkInProgress;
        Ok(())
    }

    /// Clear a fault. Counters, serial and pressure are kept.
    pub fn reset(&mut self) {
        self.status = StationStatus::Ready;
    }

    pub fn open_pressure_release_valve(&mut self) {
        self.pressure = NOMINAL_PRESSURE;
    }
}

fn checked(value: u64, by: u64, counter: &'static str) -> Result<u64, StationError> {
    value
        .checked_add(by)
        .ok_or(StationError::CounterOverflow { counter })
}

// ===========================================================================
// Tests
// ===========================================================================
