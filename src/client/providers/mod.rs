pub mod europe_pmc;
pub mod pubmed;
pub mod traits;
pub mod trials_json;
pub mod trials_scraper;
pub mod trials_structured;

pub use europe_pmc::EuropePmcProvider;
pub use pubmed::PubMedProvider;
pub use traits::{timeout_title, ProviderError, SearchQuery, SourceKind, SourceProvider};
pub use trials_json::JsonTrialsProvider;
pub use trials_scraper::ScrapingTrialsProvider;
pub use trials_structured::StructuredTrialsProvider;

use crate::client::HttpClientConfig;
use crate::config::{TrialsConfig, TrialsStrategy};
use std::sync::Arc;

/// Build the ClinicalTrials.gov provider for the configured strategy
pub fn trials_provider(
    config: &TrialsConfig,
    http: &HttpClientConfig,
) -> Result<Arc<dyn SourceProvider>, ProviderError> {
    let provider: Arc<dyn SourceProvider> = match config.strategy {
        TrialsStrategy::StructuredApi => Arc::new(StructuredTrialsProvider::new(config, http)?),
        TrialsStrategy::JsonApi => Arc::new(JsonTrialsProvider::new(config, http)?),
        TrialsStrategy::Scraping => Arc::new(ScrapingTrialsProvider::new(config, http)?),
    };
    Ok(provider)
}
