use std::io;

/// Custom error type for ticketlink operations
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use ListenerError
pub type Result<T> = std::result::Result<T, ListenerError>;
