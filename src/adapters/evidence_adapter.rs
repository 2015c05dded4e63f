//! # Evidence Adapter
//!
//! The public search boundary. A provider may fail in any way it likes; the
//! adapter turns that failure into the provider's sentinel record so callers
//! only ever see `Vec<ResultRecord>`.

use crate::client::providers::{
    trials_provider, EuropePmcProvider, PubMedProvider, SearchQuery, SourceKind, SourceProvider,
};
use crate::client::ResultRecord;
use crate::{Config, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Infallible search front for one evidence provider
#[derive(Clone)]
pub struct EvidenceAdapter {
    provider: Arc<dyn SourceProvider>,
}

impl std::fmt::Debug for EvidenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceAdapter")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl EvidenceAdapter {
    pub fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self { provider }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn description(&self) -> &str {
        self.provider.description()
    }

    pub fn kind(&self) -> SourceKind {
        self.provider.kind()
    }

    /// Search the provider.
    ///
    /// Returns at most `limit` records. A blank query or a zero limit returns
    /// an empty list without contacting the upstream. Any failure comes back
    /// as a single record whose identifier is `"error"`.
    #[instrument(skip(self), fields(source = %self.provider.name()))]
    pub async fn search(&self, query: &str, limit: usize) -> Vec<ResultRecord> {
        let query = SearchQuery::new(query, limit);
        if query.query.is_empty() || query.limit == 0 {
            debug!("Nothing to search for, skipping upstream call");
            return Vec::new();
        }

        match self.provider.search(&query).await {
            Ok(mut records) => {
                records.truncate(query.limit);
                if records.iter().any(ResultRecord::is_no_data) {
                    info!("{} had no visible results", self.provider.name());
                }
                records
            }
            Err(err) => {
                warn!("{} search failed: {}", self.provider.name(), err);
                vec![self.provider.error_record(&err)]
            }
        }
    }
}

/// Which evidence source to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    /// PubMed via the NCBI E-utilities
    Pubmed,
    /// Europe PMC REST search
    EuropePmc,
    /// ClinicalTrials.gov with the configured strategy
    Trials,
}

/// The three evidence adapters, built from configuration
#[derive(Debug, Clone)]
pub struct EvidenceSources {
    pub literature: EvidenceAdapter,
    pub secondary_literature: EvidenceAdapter,
    pub trials: EvidenceAdapter,
}

impl EvidenceSources {
    pub fn from_config(config: &Config) -> Result<Self> {
        let literature = PubMedProvider::new(&config.pubmed, &config.http)?;
        let secondary = EuropePmcProvider::new(&config.europe_pmc, &config.http)?;
        let trials = trials_provider(&config.trials, &config.http)?;

        info!(
            "Evidence sources ready (trials strategy: {:?})",
            config.trials.strategy
        );

        Ok(Self {
            literature: EvidenceAdapter::new(Arc::new(literature)),
            secondary_literature: EvidenceAdapter::new(Arc::new(secondary)),
            trials: EvidenceAdapter::new(trials),
        })
    }

    pub fn get(&self, source: Source) -> &EvidenceAdapter {
        match source {
            Source::Pubmed => &self.literature,
            Source::EuropePmc => &self.secondary_literature,
            Source::Trials => &self.trials,
        }
    }
}
