//! Error types for backend clients

use thiserror::Error;

/// Errors raised while constructing or talking to a backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// A machine address could not be turned into a usable URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an unexpected status code
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The requested key does not exist
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The backend response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The keyring could not be read or parsed
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// No key in the keyring could decrypt a value
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// A streaming watch ended or was cancelled by the server
    #[error("Watch interrupted: {0}")]
    WatchInterrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        BackendError::Decode(msg.into())
    }

    /// Create a keyring error
    pub fn keyring(msg: impl Into<String>) -> Self {
        BackendError::Keyring(msg.into())
    }

    /// Check if this error means the key is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::KeyNotFound(_))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(format!("JSON error: {}", err))
    }
}

impl From<base64::DecodeError> for BackendError {
    fn from(err: base64::DecodeError) -> Self {
        BackendError::Decode(format!("base64 error: {}", err))
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
