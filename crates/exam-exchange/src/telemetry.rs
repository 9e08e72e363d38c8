//! Log setup for the batch worker.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("could not install log subscriber: {0}")]
    Init(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Filter used when `RUST_LOG` is unset: the configured level for the
/// exchange subsystem, with the SSH layer capped at `warn` so per-packet
/// chatter never drowns a batch summary.
fn default_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = format!("{level},ssh2=warn");
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter {
        value: directives,
        source,
    })
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Init)
}
