//! Subscriber setup for the server binary.

use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt};

/// Filter used when neither `--log-filter` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error(transparent)]
    Init(#[from] TryInitError),
}

/// An explicit directive wins over `RUST_LOG`, which wins over
/// [`DEFAULT_FILTER`].
pub fn env_filter(directive: Option<&str>) -> Result<EnvFilter, ParseError> {
    match directive {
        Some(directive) => EnvFilter::try_new(directive),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(directive: Option<&str>, format: LogFormat) -> Result<(), LoggingError> {
    let filter = env_filter(directive)?;
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?,
    }
    Ok(())
}
