//! Station Package -- Open Packaging Conventions containers and the Asset
//! Administration Shell (AASX) exporter.
//!
//! # Key Types
//!
//! - [`PackageBuilder`] -- Collects parts and typed relationships, then
//!   writes the zip container with its content-type and relationship
//!   documents.
//! - [`PackageReader`] -- Reopens a container: parts, content types,
//!   relationships and their targets.
//! - [`AasxExporter`] -- Assembles the station's AASX package and persists
//!   it atomically.

pub mod aasx;
pub mod part;
pub mod reader;
pub mod writer;

pub use aasx::{AasxExporter, ExportError};
pub use part::{PackageError, PartName, Relationship};
pub use reader::PackageReader;
pub use writer::PackageBuilder;
