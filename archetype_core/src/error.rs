//! Error types for the archetype engine
//!
//! Every pipeline stage reports a single descriptive [`EngineError`] to its
//! caller instead of partially succeeding. The serving layer decides how to
//! present each kind.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure kinds surfaced by the labeling, training and inference stages
#[derive(Debug)]
pub enum EngineError {
    /// A raw or labeled dataset that the stage depends on does not exist
    MissingInput { path: PathBuf, context: String },

    /// A dataset exists but could not be read or parsed
    MalformedData { path: PathBuf, details: String },

    /// Prediction or attribution requested before artifacts were loaded
    UninitializedModel { operation: String },

    /// Caller-supplied values violate the contract of the operation
    InvalidInput { parameter: String, reason: String },

    /// Writing or reading a persisted artifact failed
    PersistenceFailure { path: PathBuf, source: CheckpointError },

    /// Engine configuration could not be loaded
    Config(ConfigError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::MissingInput { path, context } => write!(
                f,
                "Missing input: {} not found at {}",
                context,
                path.display()
            ),
            EngineError::MalformedData { path, details } => {
                write!(f, "Malformed dataset {}: {}", path.display(), details)
            }
            EngineError::UninitializedModel { operation } => write!(
                f,
                "Uninitialized model: '{}' requires a loaded classifier and standardizer. Load or train the model first.",
                operation
            ),
            EngineError::InvalidInput { parameter, reason } => {
                write!(f, "Invalid input for '{}': {}", parameter, reason)
            }
            EngineError::PersistenceFailure { path, source } => {
                write!(f, "Persistence failure at {}: {}", path.display(), source)
            }
            EngineError::Config(err) => write!(f, "Configuration error: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::PersistenceFailure { source, .. } => Some(source),
            EngineError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Config(err)
    }
}

impl EngineError {
    pub fn missing_input(path: impl AsRef<Path>, context: impl Into<String>) -> Self {
        EngineError::MissingInput {
            path: path.as_ref().to_path_buf(),
            context: context.into(),
        }
    }

    pub fn malformed(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        EngineError::MalformedData {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }

    pub fn uninitialized(operation: impl Into<String>) -> Self {
        EngineError::UninitializedModel {
            operation: operation.into(),
        }
    }

    pub fn invalid_input(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl AsRef<Path>, source: impl Into<CheckpointError>) -> Self {
        EngineError::PersistenceFailure {
            path: path.as_ref().to_path_buf(),
            source: source.into(),
        }
    }

    /// Short machine-readable tag for the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::MissingInput { .. } => "missing_input",
            EngineError::MalformedData { .. } => "malformed_data",
            EngineError::UninitializedModel { .. } => "uninitialized_model",
            EngineError::InvalidInput { .. } => "invalid_input",
            EngineError::PersistenceFailure { .. } => "persistence_failure",
            EngineError::Config(_) => "config",
        }
    }
}
