//! Station configuration.

use crate::loader::{ConfigError, deserialize_file};
use serde::{Deserialize, Serialize};
use station_core::state::{
    DEFAULT_CYCLE_TIME_MS, NOMINAL_ENERGY_CONSUMPTION, NOMINAL_PRESSURE, StationState,
};
use station_core::station::STATION_NAMESPACE_URI;
use std::path::{Path, PathBuf};

/// Everything needed to bring one station up. Every field has a default,
/// so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Namespace owned by the station's address space.
    pub namespace_uri: String,
    /// UANodeSet template imported at startup.
    pub nodeset: PathBuf,
    /// Model-description document placed in generated packages.
    pub aas_environment: PathBuf,
    /// Target of `GenerateAAS`.
    pub package_output: PathBuf,
    pub ideal_cycle_time_ms: u64,
    pub energy_consumption: f64,
    pub pressure: f64,
    /// Arm the production clock at the ideal cycle time on startup.
    pub start_clock: bool,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            namespace_uri: STATION_NAMESPACE_URI.to_string(),
            nodeset: PathBuf::from("assets/Station.NodeSet2.xml"),
            aas_environment: PathBuf::from("assets/aasenv-with-no-id.aas.xml"),
            package_output: PathBuf::from("station.aasx"),
            ideal_cycle_time_ms: DEFAULT_CYCLE_TIME_MS,
            energy_consumption: NOMINAL_ENERGY_CONSUMPTION,
            pressure: NOMINAL_PRESSURE,
            start_clock: true,
        }
    }
}

impl StationConfig {
    /// The state a station built from this configuration starts in.
    pub fn initial_state(&self) -> StationState {
        let mut state = StationState::with_cycle_time(self.ideal_cycle_time_ms);
        state.energy_consumption = self.energy_consumption;
        state.pressure = self.pressure;
        state
    }

    /// Make relative paths relative to `base` (normally the directory of the
    /// configuration file).
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for path in [
            &mut self.nodeset,
            &mut self.aas_environment,
            &mut self.package_output,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    fn validate(&self, file: &Path) -> Result<(), ConfigError> {
        let invalid = |detail: &str| ConfigError::Invalid {
            file: file.to_path_buf(),
            detail: detail.to_string(),
        };
        if self.ideal_cycle_time_ms == 0 {
            return Err(invalid("ideal_cycle_time_ms must be positive"));
        }
        if self.energy_consumption.is_nan() || self.energy_consumption < 0.0 {
            return Err(invalid("energy_consumption must be non-negative"));
        }
        if self.pressure.is_nan() || self.pressure < 0.0 {
            return Err(invalid("pressure must be non-negative"));
        }
        if self.namespace_uri.is_empty() {
            return Err(invalid("namespace_uri must not be empty"));
        }
        Ok(())
    }
}

/// Load and validate a configuration file. Relative paths inside it are
/// resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<StationConfig, ConfigError> {
    let config: StationConfig = deserialize_file(path)?;
    config.validate(path)?;
    let base = path.parent().unwrap_or(Path::new(""));
    tracing::debug!(file = %path.display(), "configuration loaded");
    Ok(config.resolve_paths(base))
}
