//! Error types for ReachMail.

/// Top-level error type for the backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

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

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Mailbox synchronization errors.
///
/// `Connect` and `Auth` are fatal to a sync pass; everything else is
/// handled per-message (skip and continue).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed for {account}: {reason}")]
    Auth { account: String, reason: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Failed to fetch message {uid}: {reason}")]
    Fetch { uid: u32, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Generative-model endpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Model request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid response from model: {reason}")]
    InvalidResponse { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Webhook notification errors. Always swallowed at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook returned status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for the backend.
pub type Result<T> = std::result::Result<T, Error>;
