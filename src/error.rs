//! Error types for housekeeper

use thiserror::Error;

/// Errors that can occur while publishing automated changes
#[derive(Debug, Error)]
pub enum Error {
    /// A keep failed to produce its changes
    #[error("keep '{keep}' failed: {message}")]
    KeepGeneration {
        /// Name of the keep that failed
        keep: String,
        /// What went wrong
        message: String,
    },

    /// Checkout, commit, diff or push failed
    #[error("git error: {0}")]
    VersionControl(String),

    /// Remote query or merge request create/update failed
    #[error("GitLab API error: {0}")]
    HostingApi(String),

    /// Missing or invalid run parameters
    #[error("configuration error: {0}")]
    Config(String),

    /// A keep yielded a change that cannot be published
    #[error("invalid change: {0}")]
    InvalidChange(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort the whole run.
    ///
    /// Only configuration errors are fatal; everything else is isolated to
    /// the keep or change that produced it.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias using housekeeper's Error
pub type Result<T> = std::result::Result<T, Error>;
