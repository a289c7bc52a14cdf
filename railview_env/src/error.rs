//! Error types for the RailView environment abstraction.

use thiserror::Error;

/// Errors raised while talking to the data source.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Transport failure (connection refused, reset, DNS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The data source answered with a non-success HTTP status
    #[error("Data source returned HTTP {0}")]
    Status(u16),

    /// The response body could not be decoded at all
    #[error("Decode error: {0}")]
    Decode(String),

    /// A single record was unusable (missing key, non-numeric field, ...)
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The data source was shut down
    #[error("Data source closed")]
    Closed,
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a malformed-record error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
