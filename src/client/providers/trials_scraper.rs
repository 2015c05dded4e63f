use super::traits::{timeout_title, ProviderError, SearchQuery, SourceKind, SourceProvider};
use crate::client::record::TRIALS_REGISTRY;
use crate::client::{HttpClientConfig, ResultRecord};
use crate::config::TrialsConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// ClinicalTrials.gov by scraping the public search page.
///
/// Each element matched by the card selector is one result. Cards that miss a
/// title, a link or an identifier are skipped; a page with no usable card
/// yields the `sin_datos` sentinel rather than an empty list.
pub struct ScrapingTrialsProvider {
    client: Client,
    site_url: Url,
    search_url: Url,
    card_selector: Selector,
    anchor_selector: Selector,
    timeout: Duration,
}

impl ScrapingTrialsProvider {
    pub fn new(config: &TrialsConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http
            .build_client()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {e}")))?;

        let site_url = Url::parse(&config.site_url)
            .map_err(|e| ProviderError::Other(format!("Invalid site URL: {e}")))?;
        let search_url = site_url
            .join(&config.search_path)
            .map_err(|e| ProviderError::Other(format!("Invalid search path: {e}")))?;

        let card_selector = Selector::parse(&config.card_selector).map_err(|e| {
            ProviderError::Other(format!("Invalid card selector '{}': {e}", config.card_selector))
        })?;
        let anchor_selector = Selector::parse("a[href]")
            .map_err(|e| ProviderError::Other(format!("Invalid anchor selector: {e}")))?;

        Ok(Self {
            client,
            site_url,
            search_url,
            card_selector,
            anchor_selector,
            timeout: http.timeout(),
        })
    }

    /// Extract up to `limit` trial records from a search results page
    pub fn parse_page(&self, html: &str, limit: usize) -> Vec<ResultRecord> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for card in document.select(&self.card_selector) {
            if records.len() >= limit {
                break;
            }
            match self.parse_card(card) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed result cards", skipped);
        }

        if records.is_empty() {
            debug!("No usable result cards on the search page");
            return vec![ResultRecord::no_data()];
        }
        records
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<ResultRecord> {
        let title = card.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            debug!("Card without title text");
            return None;
        }

        let href = card.value().attr("href").or_else(|| {
            card.select(&self.anchor_selector)
                .next()
                .and_then(|anchor| anchor.value().attr("href"))
        })?;

        let link = match self.site_url.join(href.trim()) {
            Ok(link) => link,
            Err(e) => {
                debug!("Card link '{}' does not resolve: {}", href, e);
                return None;
            }
        };

        let identifier = link
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()?
            .to_string();

        Some(ResultRecord {
            identifier,
            title,
            venue: TRIALS_REGISTRY.to_string(),
            link: link.to_string(),
            ..ResultRecord::default()
        })
    }
}

#[async_trait]
impl SourceProvider for ScrapingTrialsProvider {
    fn name(&self) -> &'static str {
        "clinical_trials_scraper"
    }

    fn label(&self) -> &'static str {
        TRIALS_REGISTRY
    }

    fn description(&self) -> &'static str {
        "ClinicalTrials.gov - public search page"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Trials
    }

    #[instrument(skip(self), fields(query = %query.query, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError> {
        let start_time = Instant::now();
        info!("Scraping ClinicalTrials.gov search page for: {}", query.query);
        debug!("Search page URL: {}", self.search_url);

        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[("term", query.query.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::from_request(&e, self.timeout))?;

        if response.status() != StatusCode::OK {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::from_request(&e, self.timeout))?;
        debug!("Search page size: {} bytes", html.len());

        let records = self.parse_page(&html, query.limit);

        info!(
            "Scraping completed: {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }

    fn error_title(&self, err: &ProviderError) -> String {
        match err {
            ProviderError::Status(code) => format!("Error HTTP {code}"),
            ProviderError::Timeout(after) => timeout_title(self.label(), *after),
            other => format!("Error al consultar ClinicalTrials.gov: {other}"),
        }
    }
}
