//! Error types for Pantry
//!
//! `PantryError` is the single domain error. Only `Validation`, `NotFound`,
//! `Serialization` and `Internal` ever reach a client; the rest are recovered
//! locally or are fatal at startup.

use std::fmt::Display;

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum PantryError {
    #[error("{0}")]
    Validation(String),

    #[error("key '{0}' not found in cache")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("peer '{peer}' communication error: {message}")]
    PeerCommunication { peer: String, message: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Internal(String),
}

impl PantryError {
    pub fn validation(message: impl Into<String>) -> Self {
        PantryError::Validation(message.into())
    }

    pub fn peer(peer: impl Into<String>, message: impl Display) -> Self {
        PantryError::PeerCommunication {
            peer: peer.into(),
            message: message.to_string(),
        }
    }

    /// Wraps an error raised behind the persistence trait boundary.
    ///
    /// Uses the alternate format so `anyhow` context chains are kept.
    pub fn persistence(err: impl Display) -> Self {
        PantryError::Persistence(format!("{err:#}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PantryError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, PantryError>;
