//! Error handling for Recast

use thiserror::Error;

/// Core error type used throughout Recast
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RecastError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON serialization/deserialization error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        file: Option<String>,
    },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RecastError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error attributed to a path
    pub fn io_at(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{}: {}", path.as_ref().display(), err),
            path: Some(path.as_ref().display().to_string()),
            source: Some(err),
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            file: None,
        }
    }

    /// Create a parse error for a specific file
    pub fn parse_in(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            file: Some(file.into()),
        }
    }

    /// Create a new not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a new invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error means the thing asked for simply isn't there
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<std::io::Error> for RecastError {
    fn from(err: std::io::Error) -> Self {
        RecastError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RecastError {
    fn from(err: serde_json::Error) -> Self {
        RecastError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Result type alias for convenience
pub type RecastResult<T> = Result<T, RecastError>;
