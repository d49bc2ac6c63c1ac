use thiserror::Error;

/// Failures reported by a page driver.
///
/// Only [`DriverError::NotReady`] and [`DriverError::Closed`] end a run; everything
/// else is absorbed by the action that triggered it.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Driver not ready")]
    NotReady,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Element is stale: handle {0}")]
    StaleHandle(u32),

    #[error("Browser session closed: {0}")]
    Closed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Driver error: {0}")]
    Other(String),
}

impl DriverError {
    /// Whether the page session is gone and no further action can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::NotReady | DriverError::Closed(_))
    }
}
