//! Engine error types.
//!
//! Pose source failures are not represented here: they are recovered inside
//! the admission loop and never reach the caller.

use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EngineError {
    /// Caller asked for something the engine is not configured for,
    /// e.g. an unknown exercise name
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No live session with this id
    #[error("Session not found: '{session_id}'")]
    SessionNotFound { session_id: String },

    /// The built-in pattern table failed validation
    #[error("Pattern registry is corrupt: {message}")]
    Registry { message: String },
}

impl EngineError {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn session_not_found(session_id: impl ToString) -> Self {
        Self::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }

    #[must_use]
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Whether the session can keep going after this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Configuration { .. } | Self::SessionNotFound { .. } => true,
            Self::Registry { .. } => false,
        }
    }
}
