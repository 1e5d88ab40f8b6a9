//! Error types for SocialSync

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SocialSyncError>;

#[derive(Error, Debug)]
pub enum SocialSyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Publish engine error: {0}")]
    Engine(String),
}

impl SocialSyncError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SocialSyncError::InvalidInput(_) => 3,
            SocialSyncError::Config(_) => 2,
            SocialSyncError::Platform(PlatformError::Authentication(_)) => 2,
            SocialSyncError::Platform(_) => 1,
            SocialSyncError::Engine(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors scoped to a single account's publish attempt.
///
/// None of these abort a publish call; the engine records them in the
/// failing account's result entry.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Posting failed: {0}")]
    Post(String),

    #[error("Network error: {0}")]
    Network(String),
}
