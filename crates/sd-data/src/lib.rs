//! Typed access to the spending collection service

pub mod config;
pub mod query;
pub mod schema;
pub mod sources;

use thiserror::Error;

// Re-exports
pub use config::ClientConfig;
pub use query::{MapQuery, Page, Sort, SortDir, SortKey};
pub use schema::Keyed;
pub use sources::{CollectionSource, HttpCollectionSource, MemorySource};

/// Errors from a single collection request. No retries are attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("{endpoint} returned HTTP {status}")]
    Status { status: u16, endpoint: String },

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("not found: {endpoint}")]
    NotFound { endpoint: String },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// HTTP status, when the service answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Endpoint the failed request was addressed to
    pub fn endpoint(&self) -> &str {
        match self {
            RemoteError::Status { endpoint, .. }
            | RemoteError::Transport { endpoint, .. }
            | RemoteError::Decode { endpoint, .. }
            | RemoteError::NotFound { endpoint } => endpoint,
            RemoteError::Config(_) => "",
        }
    }
}

pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
