use thiserror::Error;

/// Unified error type for all document store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store unreachable or refusing requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Document does not exist (update of a missing document)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A document could not be encoded to, or decoded from, the store representation
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a "not found" error with custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        StoreError::NotFound(msg.into())
    }

    /// Create an invalid document error
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        StoreError::InvalidDocument(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        StoreError::Unavailable(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
