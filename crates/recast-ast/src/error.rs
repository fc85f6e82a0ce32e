//! AST error types

use recast_foundation::RecastError;
use thiserror::Error;

/// AST operation errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AstError {
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Analysis error: {message}")]
    Analysis { message: String },

    #[error("Transformation error: {message}")]
    Transformation { message: String },

    #[error("Project error: {0}")]
    Core(#[from] RecastError),
}

impl AstError {
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    pub fn transformation(message: impl Into<String>) -> Self {
        Self::Transformation {
            message: message.into(),
        }
    }
}

impl From<AstError> for RecastError {
    fn from(err: AstError) -> Self {
        match err {
            AstError::Core(core_err) => core_err,
            AstError::Parse { file, message } => RecastError::parse_in(file, message),
            _ => RecastError::internal(format!("AST error: {}", err)),
        }
    }
}

impl From<std::io::Error> for AstError {
    fn from(err: std::io::Error) -> Self {
        Self::Core(err.into())
    }
}

/// Result type alias for AST operations
pub type AstResult<T> = Result<T, AstError>;
