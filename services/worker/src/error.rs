use std::fmt;

use exam_exchange::config::ConfigError;
use exam_exchange::export::ExportError;
use exam_exchange::import::ImportError;
use exam_exchange::telemetry::TelemetryError;
use exam_exchange::transport::TransportError;

#[derive(Debug)]
pub enum WorkerError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Transport(TransportError),
    Export(ExportError),
    Import(ImportError),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Config(err) => write!(f, "configuration error: {}", err),
            WorkerError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            WorkerError::Transport(err) => write!(f, "transport error: {}", err),
            WorkerError::Export(err) => write!(f, "export run failed: {}", err),
            WorkerError::Import(err) => write!(f, "import run failed: {}", err),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Config(err) => Some(err),
            WorkerError::Telemetry(err) => Some(err),
            WorkerError::Transport(err) => Some(err),
            WorkerError::Export(err) => Some(err),
            WorkerError::Import(err) => Some(err),
        }
    }
}

impl From<ConfigError> for WorkerError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for WorkerError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<TransportError> for WorkerError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<ExportError> for WorkerError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<ImportError> for WorkerError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}
