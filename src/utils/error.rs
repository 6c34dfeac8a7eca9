//! The `error` module defines the error types shared across `corelink`.
//!
//! Each collaborator the bootstrap talks to gets its own enum so callers can
//! tell a broker dial failure from a cache lookup failure without string
//! matching. HTTP-facing errors live in `crate::http::AppError`.

use thiserror::Error;

/// Failures raised by the broker client and its transports.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Transport-level dial failure.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// A channel operation (declare, publish, consume, ack, close) failed.
    #[error("broker channel operation failed: {0}")]
    Channel(String),

    /// A connect attempt did not settle within the configured timeout.
    #[error("broker connect timed out after {0} ms")]
    Timeout(u64),

    /// The URI scheme is not served by any transport.
    #[error("unsupported broker uri: {0}")]
    UnsupportedUri(String),
}

impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        BrokerError::Channel(err.to_string())
    }
}

/// Failures raised by cache stores.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache lookup failed: {0}")]
    Lookup(String),

    #[error("unsupported cache uri: {0}")]
    UnsupportedUri(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Lookup(err.to_string())
    }
}

/// Failures raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store error: {0}")]
    Database(#[from] sled::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("document store task failed: {0}")]
    Task(String),
}

/// Failures that stop the service from starting or serving.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}
