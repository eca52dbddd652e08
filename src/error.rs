//! Error types for Fin Assist.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Stale session write for {identity}: expected version {expected}")]
    VersionConflict { identity: String, expected: i64 },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the financial gateway (CRM) REST surface.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Gateway rejected credentials")]
    Unauthorized,

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Gateway returned {status} for {endpoint}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Invalid gateway response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("No account is linked for {identity}")]
    NotLinked { identity: String },
}

impl GatewayError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Conflict(_) => Some(409),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Media ingestion errors (KYC document downloads).
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Download of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Unsupported attachment content type: {0}")]
    UnsupportedContentType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel/transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid inbound payload: {0}")]
    InvalidMessage(String),

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
