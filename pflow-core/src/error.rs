//! Error types for pflow-core.

use thiserror::Error;

/// Result type alias for pflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for pflow operations.
///
/// The first four variants form the status taxonomy shared by the hit
/// containers and the fragment-removal metrics. `NotFound` is frequently
/// recoverable: callers treat it as "no contribution".
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied argument violates a documented precondition.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A requested layer, hit, track or shared region does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate insertion attempt.
    #[error("already present: {0}")]
    AlreadyPresent(String),

    /// A post-condition did not hold.
    #[error("failure: {0}")]
    Failure(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for the recoverable `NotFound` status.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
