//! Station Data -- configuration loading and the NodeSet template reader.
//!
//! Configuration files may be RON, TOML or JSON; the format is chosen by
//! file extension. Templates are read from UANodeSet XML documents.

pub mod config;
pub mod loader;
pub mod nodeset;

pub use config::{StationConfig, load_config};
pub use loader::ConfigError;
pub use nodeset::NodeSetFile;
