//! A running station instance.
//!
//! [`Station`] owns the state machine behind one mutex, projects every
//! transition into the address space while still holding that mutex, and
//! drives the periodic clock. Commands and clock ticks are therefore
//! totally ordered.

use crate::address_space::AddressSpace;
use crate::clock::{self, ClockControl};
use crate::id::NodeId;
use crate::projection::Projection;
use crate::state::{StationError, StationState, TickOutcome};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Namespace of the station information model.
pub const STATION_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/Station/";

/// Numeric id of `StationType` within [`STATION_NAMESPACE_URI`].
pub const STATION_TYPE_ID: u32 = 1001;

#[derive(Debug)]
pub struct Station {
    node: NodeId,
    state: Mutex<StationState>,
    projection: Projection,
    space: Arc<AddressSpace>,
    clock: ClockControl,
}

impl Station {
    /// Create the station anchored at the object `node`, binding the
    /// projection by browse path.
    pub fn new(space: Arc<AddressSpace>, node: NodeId, state: StationState) -> Arc<Self> {
        let projection = Projection::bind_station(&space, &node);
        Self::with_projection(space, node, projection, state)
    }

    pub fn with_projection(
        space: Arc<AddressSpace>,
        node: NodeId,
        projection: Projection,
        state: StationState,
    ) -> Arc<Self> {
        projection.project(&state, &space, Utc::now());
        tracing::info!(station = %node, bindings = projection.len(), "station created");
        Arc::new(Self {
            node,
            state: Mutex::new(state),
            projection,
            space,
            clock: ClockControl::new(),
        })
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn space(&self) -> &Arc<AddressSpace> {
        &self.space
    }

    pub fn clock(&self) -> &ClockControl {
        &self.clock
    }

    pub fn snapshot(&self) -> StationState {
        self.state.lock().clone()
    }

    /// Run `transition` under the station lock and project the result.
    fn transition<T>(
        &self,
        transition: impl FnOnce(&mut StationState) -> Result<T, StationError>,
    ) -> Result<(T, StationState), StationError> {
        let mut state = self.state.lock();
        let result = transition(&mut state)?;
        self.projection.project(&state, &self.space, Utc::now());
        Ok((result, state.clone()))
    }

    fn apply(&self, change: impl FnOnce(&mut StationState)) {
        let mut state = self.state.lock();
        change(&mut state);
        self.projection.project(&state, &self.space, Utc::now());
    }

    // -- Transitions --

    /// One production cycle. On error the tick is lost and state is
    /// unchanged.
    pub fn tick(&self) -> Result<TickOutcome, StationError> {
        let (outcome, state) = self.transition(StationState::tick)?;
        if outcome == TickOutcome::Faulted {
            tracing::warn!(
                station = %self.node,
                processed = state.processed(),
                "station entered fault"
            );
        }
        Ok(outcome)
    }

    /// Start producing `serial` and re-arm the clock at the actual cycle
    /// time.
    pub fn execute(&self, serial: u64) -> Result<(), StationError> {
        let mut state = self.state.lock();
        if let Err(e) = state.execute(serial) {
            tracing::info!(station = %self.node, error = %e, "execute refused");
            return Err(e);
        }
        self.projection.project(&state, &self.space, Utc::now());
        self.clock.arm(Duration::from_millis(state.actual_cycle_time_ms));
        tracing::info!(station = %self.node, serial, "execute");
        Ok(())
    }

    pub fn reset(&self) {
        self.apply(StationState::reset);
        tracing::info!(station = %self.node, "reset");
    }

    pub fn open_pressure_release_valve(&self) {
        self.apply(StationState::open_pressure_release_valve);
        tracing::info!(station = %self.node, "pressure release valve opened");
    }

    // -- Clock --

    pub fn arm_clock(&self, period: Duration) {
        self.clock.arm(period);
    }

    /// Spawn the clock task. It holds only a weak reference and exits once
    /// the station is dropped.
    pub fn spawn_clock(self: &Arc<Self>) -> JoinHandle<()> {
        let station = Arc::downgrade(self);
        clock::spawn(self.clock.subscribe(), move || {
            let Some(station) = station.upgrade() else {
                return false;
            };
            if let Err(e) = station.tick() {
                tracing::warn!(station = %station.node, error = %e, "tick lost");
            }
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StationStatus;
    use crate::test_utils::*;
    use crate::value::Variant;

    fn read(station: &Station, path: &[&str]) -> Variant {
        station
            .space()
            .browse_path(station.node(), path)
            .unwrap()
            .value()
            .unwrap()
            .value
    }

    #[test]
    fn commands_are_projected() {
        let station = station_fixture();
        station.execute(500).unwrap();
        assert_eq!(
            read(&station, &["StationProduct", "ProductSerialNumber"]),
            Variant::UInt64(500)
        );
        assert_eq!(
            read(&station, &["StationTelemetry", "Status"]),
            Variant::Int32(StationStatus::WorkInProgress.code())
        );

        station.tick().unwrap();
        assert_eq!(
            read(&station, &["StationProduct", "NumberOfManufacturedProducts"]),
            Variant::UInt64(1)
        );
        assert_eq!(
            read(&station, &["StationProduct", "ProductSerialNumber"]),
            Variant::UInt64(501)
        );
    }

    #[test]
    fn execute_while_fault_changes_nothing() {
        let station = station_fixture();
        {
            let mut state = station.state.lock();
            state.status = StationStatus::Fault;
        }
        let before = station.snapshot();
        assert!(matches!(
            station.execute(9),
            Err(StationError::InvalidTransition { .. })
        ));
        assert_eq!(station.snapshot(), before);
        assert_eq!(station.clock().period(), None);
    }

    #[test]
    fn execute_arms_clock_at_actual_cycle_time() {
        let station = station_fixture();
        assert_eq!(station.clock().period(), None);
        station.execute(1).unwrap();
        assert_eq!(station.clock().period(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn concurrent_commands_and_ticks_are_serialized() {
        let station = station_fixture();
        station.execute(0).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let station = Arc::clone(&station);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        station.tick().unwrap();
                        station.open_pressure_release_valve();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let state = station.snapshot();
        assert_eq!(state.processed(), 100);
        assert_eq!(state.product_serial_number, 100);
        assert_eq!(
            read(&station, &["StationProduct", "ProductSerialNumber"]),
            Variant::UInt64(100)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clock_drives_production() {
        let station = station_fixture();
        let _clock = station.spawn_clock();
        station.execute(10).unwrap();

        tokio::time::sleep(Duration::from_millis(15_500)).await;
        let state = station.snapshot();
        assert_eq!(state.manufactured, 3);
        assert_eq!(state.product_serial_number, 13);
        assert_eq!(state.overall_running_time_ms, 15_000);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_exits_when_station_dropped() {
        let station = station_fixture();
        let handle = station.spawn_clock();
        station.arm_clock(Duration::from_secs(1));
        drop(station);
        handle.await.unwrap();
    }
}
