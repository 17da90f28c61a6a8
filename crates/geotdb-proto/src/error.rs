//! Protocol error types.

use thiserror::Error;

/// Errors raised by the shared data types.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Text could not be parsed as a decimal.
    #[error("invalid decimal: {0:?}")]
    InvalidDecimal(String),
}
