use thiserror::Error;

/// Main error type for the configuration staging engine
///
/// Validation problems are not errors: they travel as message lists inside
/// [`crate::staging::ApplyOutcome::Rejected`]. Variants here describe I/O
/// failures and structural misuse by a caller.
#[derive(Error, Debug)]
pub enum StagingError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    // Contract violations
    #[error("Version mismatch: snapshot parent {parent}, current {current}")]
    VersionMismatch { parent: u64, current: u64 },

    #[error("Unknown configuration target: {0}")]
    UnknownTarget(String),

    #[error("Invalid patch for {target}: {reason}")]
    InvalidPatch { target: String, reason: String },

    #[error("Duplicate configuration: {0}")]
    Duplicate(String),
}

/// Result type alias for StagingError
pub type Result<T> = std::result::Result<T, StagingError>;
