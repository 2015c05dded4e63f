//! # Summarizer
//!
//! Turns an abstract into a short Spanish summary. [`Summarizer::summarize`]
//! never fails: empty input, a backend that cannot run and backend failures
//! all come back as fixed user-facing strings.
//!
//! The backend is chosen once, at construction, from [`SummarizerConfig`].

pub mod gemini;
pub mod local;
pub mod openai;

pub use gemini::GeminiBackend;
pub use local::{LocalSeq2SeqBackend, Seq2SeqModel};
pub use openai::OpenAiBackend;

use crate::client::{HttpClientConfig, NO_ABSTRACT};
use crate::config::{SummarizerBackendKind, SummarizerConfig};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Notice returned when a hosted backend has no API key
pub const MISSING_KEY_NOTICE: &str =
    "⚠️ API key no configurada. Por favor ingresa tu API key en la sección de Configuración.";

/// Notice returned when the local model could not be loaded
pub const LOCAL_MODEL_NOTICE: &str = "⚠️ Modelo local de resumen no disponible.";

/// Prefix of the notice returned when a backend call fails
pub const FAILURE_PREFIX: &str = "⚠️ Error al resumir texto: ";

/// System instruction for the chat backends
pub const SYSTEM_PROMPT: &str =
    "Eres un asistente científico que resume artículos médicos de forma concisa y precisa.";

/// User prompt for the chat backends
#[must_use]
pub fn user_prompt(text: &str) -> String {
    format!("Resume el siguiente texto científico en español en aproximadamente 3-4 oraciones clave:\n\n{text}")
}

/// Errors a backend may raise while summarizing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("Empty response from backend")]
    EmptyResponse,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl SummaryError {
    /// Classify a transport failure, keeping timeouts distinct
    #[must_use]
    pub fn from_request(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Whether a backend can serve requests right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// Not usable; the string is shown to the user as is
    Unavailable(String),
}

/// A summarization engine
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Checked before every call; an unavailable backend is never dispatched to
    fn availability(&self) -> Availability;

    /// Summarize non-empty text
    async fn summarize(&self, text: &str) -> std::result::Result<String, SummaryError>;
}

/// Infallible summarization front
#[derive(Clone)]
pub struct Summarizer {
    backend: Arc<dyn SummaryBackend>,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Summarizer {
    pub fn new(backend: Arc<dyn SummaryBackend>) -> Self {
        Self { backend }
    }

    /// Build the configured backend.
    ///
    /// Selecting the local backend loads the model here, which may block
    /// while weights are downloaded.
    pub fn from_config(config: &SummarizerConfig, http: &HttpClientConfig) -> Result<Self> {
        let backend: Arc<dyn SummaryBackend> = match config.backend {
            SummarizerBackendKind::Openai => Arc::new(OpenAiBackend::new(&config.openai, http)?),
            SummarizerBackendKind::Gemini => Arc::new(GeminiBackend::new(&config.gemini, http)?),
            SummarizerBackendKind::Local => Arc::new(LocalSeq2SeqBackend::from_config(&config.local)),
        };
        info!("Summarizer backend: {}", backend.name());
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Summarize `text`, or explain why no summary could be produced
    #[instrument(skip_all, fields(backend = %self.backend.name(), chars = text.len()))]
    pub async fn summarize(&self, text: &str) -> String {
        if text.trim().is_empty() {
            debug!("Empty input, returning placeholder");
            return NO_ABSTRACT.to_string();
        }

        if let Availability::Unavailable(notice) = self.backend.availability() {
            warn!("Summarizer backend {} is unavailable", self.backend.name());
            return notice;
        }

        let start_time = Instant::now();
        match self.backend.summarize(text).await {
            Ok(summary) => {
                info!("Summary produced in {:?}", start_time.elapsed());
                summary.trim().to_string()
            }
            Err(err) => {
                warn!("Summarization failed: {}", err);
                format!("{FAILURE_PREFIX}{err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        availability: Availability,
        result: std::result::Result<String, SummaryError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(availability: Availability, result: std::result::Result<String, SummaryError>) -> Arc<Self> {
            Arc::new(Self {
                availability,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SummaryBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn availability(&self) -> Availability {
            self.availability.clone()
        }

        async fn summarize(&self, _text: &str) -> std::result::Result<String, SummaryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_empty_input_skips_backend() {
        let backend = Scripted::new(Availability::Ready, Ok("never".to_string()));
        let summarizer = Summarizer::new(backend.clone());

        assert_eq!(summarizer.summarize("").await, NO_ABSTRACT);
        assert_eq!(summarizer.summarize(" \n\t").await, NO_ABSTRACT);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_backend_returns_notice() {
        let backend = Scripted::new(
            Availability::Unavailable(MISSING_KEY_NOTICE.to_string()),
            Ok("never".to_string()),
        );
        let summarizer = Summarizer::new(backend.clone());

        assert_eq!(summarizer.summarize("Some abstract.").await, MISSING_KEY_NOTICE);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_is_trimmed_and_failure_is_prefixed() {
        let ok = Summarizer::new(Scripted::new(Availability::Ready, Ok("  Resumen.\n".to_string())));
        assert_eq!(ok.summarize("Some abstract.").await, "Resumen.");

        let failing = Summarizer::new(Scripted::new(
            Availability::Ready,
            Err(SummaryError::Api {
                status: 429,
                message: "Rate limit reached".to_string(),
            }),
        ));
        assert_eq!(
            failing.summarize("Some abstract.").await,
            "⚠️ Error al resumir texto: API error [429]: Rate limit reached"
        );
    }

    #[test]
    fn test_user_prompt_embeds_text() {
        let prompt = user_prompt("Texto.");
        assert!(prompt.starts_with("Resume el siguiente texto científico en español"));
        assert!(prompt.ends_with("clave:\n\nTexto."));
    }

    #[test]
    fn test_from_config_defaults_to_openai() {
        let summarizer =
            Summarizer::from_config(&SummarizerConfig::default(), &HttpClientConfig::default()).unwrap();
        assert_eq!(summarizer.backend_name(), "openai");
    }
}
