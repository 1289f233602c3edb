use pricing_core::PriceError;
use thiserror::Error;

/// Errors from the durable medium and the store operations built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The medium could not be read or written (quota, disabled storage, I/O).
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("reset requires explicit confirmation")]
    NotConfirmed,
    #[error(transparent)]
    Price(#[from] PriceError),
    #[error("encoding error: {0}")]
    Encode(String),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::PersistenceUnavailable(e.to_string())
    }
}

/// Import payload could not be parsed; the live table is left untouched.
#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    #[error("unparseable import: {0}")]
    Parse(String),
    #[error(transparent)]
    Price(#[from] PriceError),
}
