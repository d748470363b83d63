use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Corrupted collection '{0}': {1}")]
    CorruptCollection(String, String),

    #[error("Actor '{0}' is no longer running")]
    ActorClosed(&'static str),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Remote error: {0}")]
    Remote(#[from] ActionError),

    #[error("Location provider error: {0}")]
    ProviderError(String),

    #[error("Location provider still active after stop")]
    ProviderStillActive,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl From<rocksdb::Error> for SyncError {
    fn from(err: rocksdb::Error) -> Self {
        SyncError::StorageError(err.into())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigError(err.to_string())
    }
}

/// Outcome of a failed remote call, classified for the retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Network failure, timeout or 5xx. Retried up to the give-up threshold.
    #[error("transient: {0}")]
    Transient(String),

    /// Validation failure or 4xx. Retrying the same request cannot succeed.
    #[error("permanent: {0}")]
    Permanent(String),

    /// The action payload itself is unusable.
    #[error("corrupt: {0}")]
    Corrupt(String),
}

impl ActionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Transient(_))
    }

    /// Classify an HTTP status. 408 and 429 are worth retrying, other 4xx are not.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            408 | 429 => ActionError::Transient(format!("HTTP {}: {}", status, body)),
            400..=499 => ActionError::Permanent(format!("HTTP {}: {}", status, body)),
            _ => ActionError::Transient(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for ActionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ActionError::Corrupt(err.to_string());
        }
        match err.status() {
            Some(status) => ActionError::from_status(status.as_u16(), err.to_string()),
            None => ActionError::Transient(err.to_string()),
        }
    }
}
