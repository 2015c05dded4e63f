use crate::client::ResultRecord;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Query handed to a source provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text query, already trimmed
    pub query: String,
    /// Maximum number of records to return
    pub limit: usize,
}

impl SearchQuery {
    #[must_use]
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.trim().to_string(),
            limit,
        }
    }
}

/// Which family of evidence a provider returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Literature,
    Trials,
}

/// Errors that can occur inside a provider before they are turned into a
/// sentinel record at the adapter boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unexpected response structure: {0}")]
    Parse(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Classify a transport failure, keeping timeouts distinct
    #[must_use]
    pub fn from_request(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_connect() {
            Self::Network(format!("Connection failed: {err}"))
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Network(format!("Request failed: {err}"))
        }
    }
}

/// Trait for evidence source providers.
///
/// Implementations may fail freely; [`crate::adapters::EvidenceAdapter`] owns
/// the rule that nothing but records ever reaches the caller.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Unique name/identifier for this provider
    fn name(&self) -> &str;

    /// Upstream name used in diagnostics shown to users
    fn label(&self) -> &str;

    /// Human-readable description of the provider
    fn description(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Search the upstream and normalize what it returns
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError>;

    /// Title of the error sentinel for a failed search
    fn error_title(&self, err: &ProviderError) -> String {
        match err {
            ProviderError::Status(code) => format!("Error HTTP {code}"),
            ProviderError::Timeout(after) => timeout_title(self.label(), *after),
            other => format!("Error al buscar en {}: {other}", self.label()),
        }
    }

    /// Sentinel record standing in for a failed search
    fn error_record(&self, err: &ProviderError) -> ResultRecord {
        ResultRecord::error(self.error_title(err))
    }
}

/// Sentinel title shared by every provider for timeouts
#[must_use]
pub fn timeout_title(label: &str, after: Duration) -> String {
    format!(
        "Tiempo de espera agotado al consultar {label} ({}s)",
        after.as_secs()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl SourceProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn label(&self) -> &str {
            "Failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn kind(&self) -> SourceKind {
            SourceKind::Literature
        }
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError> {
            Err(ProviderError::Network("boom".to_string()))
        }
    }

    #[test]
    fn test_query_is_trimmed() {
        let query = SearchQuery::new("  semaglutide \n", 5);
        assert_eq!(query.query, "semaglutide");
        assert_eq!(query.limit, 5);
    }

    #[test]
    fn test_default_error_titles() {
        let provider = Failing;
        assert_eq!(provider.error_title(&ProviderError::Status(503)), "Error HTTP 503");
        assert_eq!(
            provider.error_title(&ProviderError::Timeout(Duration::from_secs(10))),
            "Tiempo de espera agotado al consultar Failing (10s)"
        );
        assert_eq!(
            provider.error_title(&ProviderError::Network("boom".to_string())),
            "Error al buscar en Failing: Network error: boom"
        );
    }
}
