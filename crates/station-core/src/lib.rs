//! Station Core -- the address space and production model of a simulated
//! manufacturing station.
//!
//! This crate provides the node registry that gives every piece of station
//! data and every command a stable, typed identity, the station's
//! production/fault state machine, the projection of that state into the
//! registry, and the dispatcher that routes remote commands to it.
//!
//! # Startup
//!
//! The registry is built once: a [`template::TemplateSource`] is imported,
//! a [`behavior::BehaviorTable`] specializes the nodes whose types it knows,
//! and the [`station::Station`] binds its projection by browse path from the
//! specialized station object:
//!
//! ```rust,ignore
//! let space = Arc::new(AddressSpace::new(STATION_NAMESPACE_URI));
//! space.import_templates(&source, &BehaviorTable::station())?;
//! let node = space.objects_of_kind(ObjectKind::Station)[0].id.clone();
//! let station = Station::new(space, node, StationState::default());
//! station.spawn_clock();
//! ```
//!
//! # Key Types
//!
//! - [`address_space::AddressSpace`] -- Node graph with identifier
//!   allocation, template import, and O(1) lookup.
//! - [`state::StationState`] -- Pure state machine: tick, execute, reset,
//!   pressure release.
//! - [`station::Station`] -- Per-instance owner of the state behind one
//!   lock, plus projection and the periodic clock.
//! - [`command::CommandDispatcher`] -- Argument validation and routing of
//!   remote calls.

pub mod address_space;
pub mod behavior;
pub mod clock;
pub mod command;
pub mod id;
pub mod namespace;
pub mod node;
pub mod projection;
pub mod state;
pub mod station;
pub mod template;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
