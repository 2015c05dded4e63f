use crate::client::providers::ProviderError;
use crate::summarizer::SummaryError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or configuring the adapter layer.
///
/// Searches and summaries never surface these: adapters turn failures into
/// sentinel records and notices. This type covers construction, configuration
/// and the CLI.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // Serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Network
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // Adapter errors
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Summarizer error: {0}")]
    Summarizer(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(timeout) => Self::Timeout { timeout },
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<SummaryError> for Error {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::Timeout(timeout) => Self::Timeout { timeout },
            other => Self::Summarizer(other.to_string()),
        }
    }
}
