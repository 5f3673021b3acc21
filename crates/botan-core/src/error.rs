//! Error types for the dialogue core.
//!
//! Collaborator failures (transport, timeout, parse) are recovered locally by
//! the pipeline and never reach the connection layer; `CoreError` is what the
//! remaining fallible surfaces (config, persistence, registry) report.

use thiserror::Error;

/// Errors produced by the dialogue core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The generation collaborator could not be reached or returned a
    /// transport-level failure. The pipeline converts this into a fallback
    /// turn; it only escapes for callers that talk to the bridge directly.
    #[error("generation bridge failure: {0}")]
    Bridge(String),

    /// The collaborator call exceeded its bounded timeout.
    #[error("generation bridge timed out after {0}s")]
    BridgeTimeout(u64),

    /// Best-effort session persistence failed.
    #[error("session persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    /// Serialization of a persisted record or wire message failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Errors produced by the connection registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection handle is already registered in some group.
    #[error("connection {0} is already registered")]
    DuplicateConnection(uuid::Uuid),

    /// The peer's channel is closed; the registry has reaped the connection.
    #[error("connection {0} is dead and has been unregistered")]
    DeadConnection(uuid::Uuid),
}

pub type CoreResult<T> = Result<T, CoreError>;
