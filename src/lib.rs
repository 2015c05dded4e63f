//! # Evidence Monitor
//!
//! Searches biomedical evidence sources (PubMed, Europe PMC and
//! ClinicalTrials.gov), normalizes every hit into a [`ResultRecord`] and
//! summarizes abstracts through a configurable backend.
//!
//! Search and summarization never fail from the caller's point of view:
//! failures come back as sentinel records or user-facing notices.

pub mod adapters;
pub mod client;
pub mod config;
pub mod error;
pub mod summarizer;

pub use adapters::{EvidenceAdapter, EvidenceSources, Source};
pub use client::providers::{ProviderError, SearchQuery, SourceKind, SourceProvider};
pub use client::{HttpClientConfig, ResultRecord, ERROR_ID, NO_DATA_ID};
pub use config::{Config, ConfigOverrides, SummarizerBackendKind, TrialsStrategy};
pub use error::{Error, Result};
pub use summarizer::{Availability, SummaryBackend, SummaryError, Summarizer};
