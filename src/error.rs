use thiserror::Error;

/// Failures surfaced by a `RemoteStore` implementation.
///
/// Transport details are flattened into strings so the error can travel
/// through UI messages, which must be `Clone`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("No authenticated identity; sign in before writing")]
    Unauthenticated,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed record {id}: {reason}")]
    Malformed { id: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Failures of the application state layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Study space not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Application state is already initialized")]
    AlreadyInitialized,

    #[error("Invalid catalog entry: {0}")]
    Catalog(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Failures reading the cached user profile.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Could not read profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse profile: {0}")]
    Parse(#[from] serde_json::Error),
}
