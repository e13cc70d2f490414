//! Error types for the Doom provider.

use thiserror::Error;

/// Provider error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Executable could not be located at configuration time
    #[error(transparent)]
    Resolution(#[from] crate::provider::locator::ResolutionError),

    /// Session process could not be started or released
    #[error(transparent)]
    Launch(#[from] crate::session::resource::LaunchError),

    /// Session process could not be signalled
    #[error(transparent)]
    Termination(#[from] crate::session::resource::TerminationError),

    /// In-place update was requested
    #[error("Updating a {resource} in place is not supported: {reason}")]
    UnsupportedOperation {
        resource: String,
        reason: String,
    },

    /// Persisted state store error
    #[error(transparent)]
    State(#[from] crate::state::StateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short headline for driver diagnostics. `Display` carries the detail.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "Failed to find Doom executable",
            Self::Launch(_) => "Failed to start Doom",
            Self::Termination(_) => "Failed to kill Doom session",
            Self::UnsupportedOperation { .. } => "Update not supported",
            Self::State(_) => "Failed to access state",
            Self::Io(_) => "IO error",
            Self::Json(_) => "Invalid JSON",
        }
    }

    /// Whether the error blocks every resource operation for this configuration.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;
