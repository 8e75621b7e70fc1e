//! Error types for the travel concierge engine.

use std::time::Duration;

/// Startup error: bad configuration or an unreachable store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Failures of the catalog and flight-search collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} timed out after {timeout:?}")]
    Timeout { service: String, timeout: Duration },

    #[error("{service} is not configured")]
    Unavailable { service: String },
}

/// Conversation store errors visible to callers.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Invalid conversation status: {value} (expected new, in-progress, resolved or follow-up)")]
    InvalidStatus { value: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
