//! Error types for the service layer

use recast_foundation::RecastError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures starting or driving an external engine execution
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Wait until the previous codemod set execution has finished")]
    ExecutionInProgress,

    #[error("Failed to start engine '{}': {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine {0} is not piped")]
    MissingPipe(&'static str),

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for RecastError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ExecutionInProgress => RecastError::conflict(err.to_string()),
            EngineError::Io(io) => RecastError::from(io),
            other => RecastError::internal(other.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_conflict() {
        let err: RecastError = EngineError::ExecutionInProgress.into();
        assert!(matches!(err, RecastError::Conflict { .. }));
        assert!(err
            .to_string()
            .contains("Wait until the previous codemod set execution has finished"));
    }
}
