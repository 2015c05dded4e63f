//! # Configuration
//!
//! Layered application configuration. Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (explicit path or the user config directory)
//! 3. `EVIDENCE_MONITOR_<SECTION>__<FIELD>` environment variables
//! 4. the well-known credential variables (`OPENAI_API_KEY`, `GEMINI_API_KEY`,
//!    `NCBI_API_KEY`, `NCBI_EMAIL`)
//!
//! Configuration is read-only: nothing here writes back to disk.

use crate::client::HttpClientConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

const ENV_PREFIX: &str = "EVIDENCE_MONITOR";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpClientConfig,
    pub pubmed: PubMedConfig,
    pub europe_pmc: EuropePmcConfig,
    pub trials: TrialsConfig,
    pub summarizer: SummarizerConfig,
}

/// NCBI E-utilities settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubMedConfig {
    /// Base URL holding `esearch.fcgi` and `efetch.fcgi`
    pub base_url: String,
    /// Tool name reported to NCBI
    pub tool: String,
    /// Contact address reported to NCBI
    pub email: Option<String>,
    /// NCBI API key (raises the rate limit)
    pub api_key: Option<String>,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            tool: "evidence-monitor".to_string(),
            email: None,
            api_key: None,
        }
    }
}

/// Europe PMC REST settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EuropePmcConfig {
    /// Base URL of the REST service, `search` is appended
    pub base_url: String,
}

impl Default for EuropePmcConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string(),
        }
    }
}

/// Integration strategy used to reach ClinicalTrials.gov
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TrialsStrategy {
    /// Legacy field-projection API (`api/query/study_fields`)
    #[default]
    StructuredApi,
    /// Unofficial versioned JSON API (`api/v1/studies`)
    JsonApi,
    /// HTML search page scraping
    Scraping,
}

/// ClinicalTrials.gov settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialsConfig {
    pub strategy: TrialsStrategy,
    /// Field-projection endpoint
    pub structured_url: String,
    /// Versioned studies endpoint
    pub json_api_url: String,
    /// Public site, used both for the search page and to resolve card links
    pub site_url: String,
    /// Path of the HTML search page on `site_url`
    pub search_path: String,
    /// CSS selector matching one anchor per result card
    pub card_selector: String,
}

impl Default for TrialsConfig {
    fn default() -> Self {
        Self {
            strategy: TrialsStrategy::default(),
            structured_url: "https://clinicaltrials.gov/api/query/study_fields".to_string(),
            json_api_url: "https://clinicaltrials.gov/api/v1/studies".to_string(),
            site_url: "https://clinicaltrials.gov".to_string(),
            search_path: "/search".to_string(),
            card_selector: "a.result-title".to_string(),
        }
    }
}

/// Which summarization backend serves the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummarizerBackendKind {
    /// Hosted chat-completion API
    #[default]
    Openai,
    /// Local sequence-to-sequence model
    Local,
    /// Hosted Gemini content generation
    Gemini,
}

/// Summarization settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub backend: SummarizerBackendKind,
    pub openai: OpenAiConfig,
    pub local: LocalModelConfig,
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Completion token budget
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalModelConfig {
    /// Hugging Face model id
    pub model_id: String,
    /// Minimum generated tokens
    pub min_length: usize,
    /// Maximum generated tokens
    pub max_length: usize,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_id: "t5-small".to_string(),
            min_length: 30,
            max_length: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash".to_string(),
            max_output_tokens: 256,
        }
    }
}

/// Credentials read from their conventional environment variables
#[derive(Debug, Default, Deserialize)]
struct Credentials {
    openai_api_key: Option<String>,
    gemini_api_key: Option<String>,
    ncbi_api_key: Option<String>,
    ncbi_email: Option<String>,
}

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub timeout_secs: Option<u64>,
    pub trials_strategy: Option<TrialsStrategy>,
    pub summarizer_backend: Option<SummarizerBackendKind>,
}

impl Config {
    /// Default location of the optional configuration file
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("evidence-monitor").join("config.toml"))
    }

    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default) = Self::default_path() {
                    debug!("Looking for optional configuration at {}", default.display());
                    builder = builder.add_source(config::File::from(default).required(false));
                }
            }
        }

        let mut config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        let credentials: Credentials = envy::from_env()?;
        config.apply_credentials(credentials);
        config.validate()?;

        Ok(config)
    }

    fn apply_credentials(&mut self, credentials: Credentials) {
        if let Some(key) = credentials.openai_api_key {
            self.summarizer.openai.api_key.get_or_insert(key);
        }
        if let Some(key) = credentials.gemini_api_key {
            self.summarizer.gemini.api_key.get_or_insert(key);
        }
        if let Some(key) = credentials.ncbi_api_key {
            self.pubmed.api_key.get_or_insert(key);
        }
        if let Some(email) = credentials.ncbi_email {
            self.pubmed.email.get_or_insert(email);
        }
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(timeout) = overrides.timeout_secs {
            self.http.timeout_secs = timeout;
        }
        if let Some(strategy) = overrides.trials_strategy {
            self.trials.strategy = strategy;
        }
        if let Some(backend) = overrides.summarizer_backend {
            self.summarizer.backend = backend;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "timeout must be greater than 0"));
        }
        if self.http.connect_timeout_secs == 0 {
            return Err(invalid(
                "http.connect_timeout_secs",
                "timeout must be greater than 0",
            ));
        }

        for (field, value) in [
            ("pubmed.base_url", &self.pubmed.base_url),
            ("europe_pmc.base_url", &self.europe_pmc.base_url),
            ("trials.structured_url", &self.trials.structured_url),
            ("trials.json_api_url", &self.trials.json_api_url),
            ("trials.site_url", &self.trials.site_url),
            ("summarizer.openai.base_url", &self.summarizer.openai.base_url),
            ("summarizer.gemini.base_url", &self.summarizer.gemini.base_url),
        ] {
            Url::parse(value).map_err(|e| invalid(field, &format!("invalid URL: {e}")))?;
        }

        if self.trials.card_selector.trim().is_empty() {
            return Err(invalid("trials.card_selector", "selector cannot be empty"));
        }
        if scraper::Selector::parse(&self.trials.card_selector).is_err() {
            return Err(invalid("trials.card_selector", "selector does not parse"));
        }

        let local = &self.summarizer.local;
        if local.max_length == 0 || local.min_length > local.max_length {
            return Err(invalid(
                "summarizer.local",
                "min_length must not exceed max_length, and max_length must be positive",
            ));
        }
        if self.summarizer.openai.max_tokens == 0 {
            return Err(invalid("summarizer.openai.max_tokens", "token budget must be positive"));
        }
        if self.summarizer.gemini.max_output_tokens == 0 {
            return Err(invalid(
                "summarizer.gemini.max_output_tokens",
                "token budget must be positive",
            ));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML with secrets masked
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        for secret in [
            &mut shown.pubmed.api_key,
            &mut shown.summarizer.openai.api_key,
            &mut shown.summarizer.gemini.api_key,
        ] {
            if secret.is_some() {
                *secret = Some("***".to_string());
            }
        }
        toml::to_string_pretty(&shown).map_err(|e| Error::Serialization(e.to_string()))
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidInput {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.trials.strategy, TrialsStrategy::StructuredApi);
        assert_eq!(config.summarizer.backend, SummarizerBackendKind::Openai);
        assert_eq!(config.summarizer.openai.max_tokens, 150);
        assert_eq!(config.summarizer.local.min_length, 30);
        assert_eq!(config.summarizer.local.max_length, 100);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidInput { .. })));

        let mut config = Config::default();
        config.europe_pmc.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidInput { field, .. }) if field == "europe_pmc.base_url"));

        let mut config = Config::default();
        config.trials.card_selector = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.trials.card_selector = "a[".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.summarizer.local.min_length = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(&ConfigOverrides {
            timeout_secs: Some(3),
            trials_strategy: Some(TrialsStrategy::Scraping),
            summarizer_backend: Some(SummarizerBackendKind::Gemini),
        });
        assert_eq!(config.http.timeout_secs, 3);
        assert_eq!(config.trials.strategy, TrialsStrategy::Scraping);
        assert_eq!(config.summarizer.backend, SummarizerBackendKind::Gemini);
    }

    #[test]
    fn test_credentials_do_not_override_explicit_keys() {
        let mut config = Config::default();
        config.summarizer.openai.api_key = Some("from-file".to_string());
        config.apply_credentials(Credentials {
            openai_api_key: Some("from-env".to_string()),
            gemini_api_key: Some("gemini-env".to_string()),
            ncbi_api_key: None,
            ncbi_email: Some("lab@example.org".to_string()),
        });
        assert_eq!(config.summarizer.openai.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.summarizer.gemini.api_key.as_deref(), Some("gemini-env"));
        assert_eq!(config.pubmed.email.as_deref(), Some("lab@example.org"));
        assert_eq!(config.pubmed.api_key, None);
    }

    #[test]
    fn test_redacted_toml_hides_keys() {
        let mut config = Config::default();
        config.summarizer.openai.api_key = Some("sk-secret".to_string());
        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
        assert!(rendered.contains("strategy = \"structured_api\""));
    }
}
