//! Error types for docbridge

use thiserror::Error;

/// Result type alias for docbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for all docbridge operations
///
/// Driver failures are carried as-is in [`BridgeError::MongoDB`]; nothing in
/// this crate retries or reclassifies them. The type is `Clone` so that one
/// settled failure can be handed to every caller waiting on the same
/// [`Hub`](crate::Hub).
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Error produced by the MongoDB driver
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns true if this error came straight from the database driver
    pub fn is_driver_error(&self) -> bool {
        matches!(self, BridgeError::MongoDB(_))
    }
}

impl From<bson::ser::Error> for BridgeError {
    fn from(err: bson::ser::Error) -> Self {
        BridgeError::Serialization(format!("BSON serialization error: {}", err))
    }
}

impl From<bson::de::Error> for BridgeError {
    fn from(err: bson::de::Error) -> Self {
        BridgeError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}
