use thiserror::Error;

/// Result type for session store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting session archives
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Store misconfigured: {message}")]
    Config { message: String },

    #[error("Request rejected with status {status}")]
    Rejected { status: u16 },

    #[error("Transfer failed for {key}: {reason}")]
    Transfer { key: String, reason: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a transfer error
    pub fn transfer<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        Self::Transfer {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the object is simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
