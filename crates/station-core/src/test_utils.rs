//! Shared fixtures for unit and integration tests.
//!
//! Enabled for this crate's tests and for downstream crates through the
//! `test-utils` feature.

use crate::address_space::AddressSpace;
use crate::behavior::BehaviorTable;
use crate::id::{NodeId, QualifiedName, well_known};
use crate::node::{ObjectKind, ReferenceType};
use crate::state::{StationState, StationStatus};
use crate::station::{STATION_NAMESPACE_URI, STATION_TYPE_ID, Station};
use crate::template::{
    NodeDefinition, NodeDefinitionKind, Template, TemplateReference, TypeDefinition,
};
use crate::value::Variant;
use std::sync::Arc;

/// Id of the station instance in [`station_template`], in the template's
/// local namespace 1.
pub const STATION_INSTANCE_ID: u32 = 5001;

fn definition(id: u32, name: &str, kind: NodeDefinitionKind, parent: NodeId) -> NodeDefinition {
    let mut def = NodeDefinition::new(NodeId::numeric(1, id), QualifiedName::new(1, name), kind);
    let reference_type = if parent == well_known::OBJECTS_FOLDER {
        ReferenceType::Organizes
    } else {
        ReferenceType::HasComponent
    };
    def.parent = Some(TemplateReference {
        reference_type,
        target: parent,
    });
    def
}

fn variable(id: u32, name: &str, value: Variant, parent: u32) -> NodeDefinition {
    definition(
        id,
        name,
        NodeDefinitionKind::Variable {
            data_type: value.data_type(),
            value: Some(value),
        },
        NodeId::numeric(1, parent),
    )
}

fn object(id: u32, name: &str, parent: u32) -> NodeDefinition {
    definition(id, name, NodeDefinitionKind::Object, NodeId::numeric(1, parent))
}

fn method(id: u32, name: &str, parent: u32) -> NodeDefinition {
    definition(id, name, NodeDefinitionKind::Method, NodeId::numeric(1, parent))
}

/// The station information model: one `StationType` instance with its
/// product, telemetry and command children.
pub fn station_template() -> Template {
    let mut instance = definition(
        STATION_INSTANCE_ID,
        "StationInstance",
        NodeDefinitionKind::Object,
        well_known::OBJECTS_FOLDER,
    );
    instance.type_definition = Some(NodeId::numeric(1, STATION_TYPE_ID));

    Template {
        namespace_uris: vec![STATION_NAMESPACE_URI.to_string()],
        types: vec![TypeDefinition {
            id: NodeId::numeric(1, STATION_TYPE_ID),
            browse_name: QualifiedName::new(1, "StationType"),
            display_name: "StationType".to_string(),
        }],
        nodes: vec![
            instance,
            object(5002, "StationProduct", STATION_INSTANCE_ID),
            variable(6001, "ProductSerialNumber", Variant::UInt64(0), 5002),
            variable(6002, "NumberOfManufacturedProducts", Variant::UInt64(0), 5002),
            variable(6003, "NumberOfDiscardedProducts", Variant::UInt64(0), 5002),
            object(5003, "StationTelemetry", STATION_INSTANCE_ID),
            variable(6004, "Status", Variant::Int32(0), 5003),
            variable(6005, "IdealCycleTime", Variant::UInt64(5000), 5003),
            variable(6006, "ActualCycleTime", Variant::UInt64(5000), 5003),
            variable(6007, "EnergyConsumption", Variant::Double(1000.0), 5003),
            variable(6008, "Pressure", Variant::Double(1000.0), 5003),
            variable(6009, "OverallRunningTime", Variant::UInt64(0), 5003),
            object(5004, "StationCommands", STATION_INSTANCE_ID),
            method(7001, "Execute", 5004),
            method(7002, "Reset", 5004),
            method(7003, "OpenPressureReleaseValve", 5004),
        ],
    }
}

/// An address space with [`station_template`] imported.
pub fn station_space() -> AddressSpace {
    let space = AddressSpace::new(STATION_NAMESPACE_URI);
    space
        .import_templates(&station_template(), &BehaviorTable::station())
        .expect("station template imports");
    space
}

/// A station over [`station_space`] in its default state.
pub fn station_fixture() -> Arc<Station> {
    let space = Arc::new(station_space());
    let node = space.objects_of_kind(ObjectKind::Station)[0].id.clone();
    Station::new(space, node, StationState::default())
}

/// A state that is mid-production.
pub fn running_state() -> StationState {
    let mut state = StationState::default();
    state.status = StationStatus::WorkInProgress;
    state.product_serial_number = 42;
    state.manufactured = 41;
    state.overall_running_time_ms = 41 * state.actual_cycle_time_ms;
    state
}
