//! Projection of station state fields onto variable nodes.
//!
//! Each [`StationField`] may be bound to one variable node. Projecting
//! writes every bound field; fields without a binding, and bindings whose
//! node is not in the address space, are skipped.

use crate::address_space::AddressSpace;
use crate::id::NodeId;
use crate::state::StationState;
use crate::value::Variant;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StationField {
    ProductSerialNumber,
    NumberOfManufacturedProducts,
    NumberOfDiscardedProducts,
    Status,
    IdealCycleTime,
    ActualCycleTime,
    EnergyConsumption,
    Pressure,
    OverallRunningTime,
}

impl StationField {
    pub const ALL: [StationField; 9] = [
        StationField::ProductSerialNumber,
        StationField::NumberOfManufacturedProducts,
        StationField::NumberOfDiscardedProducts,
        StationField::Status,
        StationField::IdealCycleTime,
        StationField::ActualCycleTime,
        StationField::EnergyConsumption,
        StationField::Pressure,
        StationField::OverallRunningTime,
    ];

    /// Browse path of the bound variable, relative to the station object.
    pub fn browse_path(self) -> [&'static str; 2] {
        match self {
            StationField::ProductSerialNumber => ["StationProduct", "ProductSerialNumber"],
            StationField::NumberOfManufacturedProducts => {
                ["StationProduct", "NumberOfManufacturedProducts"]
            }
            StationField::NumberOfDiscardedProducts => {
                ["StationProduct", "NumberOfDiscardedProducts"]
            }
            StationField::Status => ["StationTelemetry", "Status"],
            StationField::IdealCycleTime => ["StationTelemetry", "IdealCycleTime"],
            StationField::ActualCycleTime => ["StationTelemetry", "ActualCycleTime"],
            StationField::EnergyConsumption => ["StationTelemetry", "EnergyConsumption"],
            StationField::Pressure => ["StationTelemetry", "Pressure"],
            StationField::OverallRunningTime => ["StationTelemetry", "OverallRunningTime"],
        }
    }

    pub fn value(self, state: &StationState) -> Variant {
        match self {
            StationField::ProductSerialNumber => Variant::UInt64(state.product_serial_number),
            StationField::NumberOfManufacturedProducts => Variant::UInt64(state.manufactured),
            StationField::NumberOfDiscardedProducts => Variant::UInt64(state.discarded),
            StationField::Status => Variant::Int32(state.status.code()),
            StationField::IdealCycleTime => Variant::UInt64(state.ideal_cycle_time_ms),
            StationField::ActualCycleTime => Variant::UInt64(state.actual_cycle_time_ms),
            StationField::EnergyConsumption => Variant::Double(state.energy_consumption),
            StationField::Pressure => Variant::Double(state.pressure),
            StationField::OverallRunningTime => Variant::UInt64(state.overall_running_time_ms),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Projection {
    bindings: BTreeMap<StationField, NodeId>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every field by browse path from `station`. Fields whose path
    /// does not exist stay unbound.
    pub fn bind_station(space: &AddressSpace, station: &NodeId) -> Self {
        let mut projection = Self::new();
        for field in StationField::ALL {
            match space.browse_path(station, &field.browse_path()) {
                Some(node) => {
                    projection.bindings.insert(field, node.id.clone());
                }
                None => tracing::debug!(?field, station = %station, "field left unbound"),
            }
        }
        projection
    }

    pub fn with_binding(mut self, field: StationField, node: NodeId) -> Self {
        self.bindings.insert(field, node);
        self
    }

    pub fn binding(&self, field: StationField) -> Option<&NodeId> {
        self.bindings.get(&field)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Write every bound field of `state`. Returns how many node values
    /// changed.
    pub fn project(&self, state: &StationState, space: &AddressSpace, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for (&field, id) in &self.bindings {
            let Some(node) = space.find(id) else {
                continue;
            };
            match node.write_value(field.value(state), now) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(?field, error = %e, "projection write refused"),
            }
        }
        changed
    }
}
