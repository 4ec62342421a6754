use std::fmt;

use export::ExportErr;
use policy::PolicyErr;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before anything is written.
    InvalidConfig(String),
    /// Building or verifying an artifact failed. Nothing was written for that export.
    Export(ExportErr),
    /// A checkpoint could not be encoded or decoded.
    Checkpoint(String),
    /// An underlying I/O error not covered by the above variants.
    Io(std::io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Export(e) => write!(f, "export failed: {e}"),
            Self::Checkpoint(msg) => write!(f, "checkpoint error: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Export(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ExportErr> for OrchestratorError {
    fn from(e: ExportErr) -> Self {
        Self::Export(e)
    }
}

impl From<PolicyErr> for OrchestratorError {
    fn from(e: PolicyErr) -> Self {
        Self::Export(e.into())
    }
}

impl From<safetensors::SafeTensorError> for OrchestratorError {
    fn from(e: safetensors::SafeTensorError) -> Self {
        Self::Checkpoint(e.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
