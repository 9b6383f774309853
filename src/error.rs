use crate::domain::attempt::ValidationErrors;
use thiserror::Error;

/// Raised by a provider when a callback payload fails its authenticity check.
///
/// Kept apart from [`PaymentError`] so that `interpret_callback` can only ever
/// fail this one way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("callback integrity check failed: {reason}")]
pub struct IntegrityError {
    pub reason: String,
}

impl IntegrityError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),
    #[error("Unknown bank: {0}")]
    UnknownBank(String),
    #[error("Provider configuration error: {0}")]
    ProviderConfiguration(String),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl PaymentError {
    /// Shorthand for a single structural problem on one field.
    pub fn invalid(field: crate::domain::attempt::Field, message: impl Into<String>) -> Self {
        PaymentError::Validation(ValidationErrors::single(field, message))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
