/// Result alias that carries the custom [`MediaSyncError`] type.
pub type Result<T> = std::result::Result<T, MediaSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MediaSyncError {
    /// Free-form message used by callers that only need to surface a
    /// readable string without committing to a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialization errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The tempo timeline exposes no bar occurrences, so there is
    /// nothing to build markers from.
    #[error("score timeline has no bar occurrences")]
    EmptyTimeline,
    /// A marker index passed to an edit operation does not exist.
    #[error("marker index {0} is out of range")]
    MarkerOutOfRange(usize),
}

impl MediaSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MediaSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MediaSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
