//! Remote rule engine error types

use thiserror::Error;

/// Result type for remote rule operations
pub type Result<T> = std::result::Result<T, RemoteInfoError>;

/// Remote rule engine errors
///
/// The first five variants are returned to management callers. `Fetch` and
/// `LineParse` stay inside the refresh pipeline and are only ever logged.
#[derive(Debug, Error)]
pub enum RemoteInfoError {
    /// Source URL already declared
    #[error("Source already exists: {0}")]
    DuplicateSource(String),

    /// Source URL not declared
    #[error("Source not found: {0}")]
    NotFound(String),

    /// A refresh for this source is running right now
    #[error("Source is being refreshed, try again shortly: {0}")]
    Busy(String),

    /// Refresh interval is zero or unparseable
    #[error("Invalid refresh interval: {0}")]
    InvalidInterval(String),

    /// Extraction pattern does not compile or lacks the required groups
    #[error("Invalid extraction pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Remote document could not be retrieved
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A single document line could not be turned into a rule
    #[error("Line {line}: {reason}")]
    LineParse { line: usize, reason: String },

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for RemoteInfoError {
    fn from(err: sqlx::Error) -> Self {
        RemoteInfoError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for RemoteInfoError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        RemoteInfoError::Fetch {
            url,
            reason: err.to_string(),
        }
    }
}
