use super::traits::{timeout_title, ProviderError, SearchQuery, SourceKind, SourceProvider};
use crate::client::record::DASH;
use crate::client::{links, HttpClientConfig, ResultRecord, NO_ABSTRACT};
use crate::config::EuropePmcConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Source tag assumed when Europe PMC omits one
const DEFAULT_SOURCE: &str = "MED";

/// Europe PMC search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultList", default)]
    result_list: Option<ResultList>,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<EuropePmcResult>,
}

/// Individual search hit
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EuropePmcResult {
    id: Option<String>,
    title: Option<String>,
    source: Option<String>,
    pub_type: Option<String>,
    author_string: Option<String>,
    abstract_text: Option<String>,
}

/// Europe PMC provider for literature aggregated from PubMed, PMC, preprints
/// and patents
pub struct EuropePmcProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl EuropePmcProvider {
    /// Create a new Europe PMC provider
    pub fn new(config: &EuropePmcConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http
            .build_client()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: http.timeout(),
        })
    }

    fn parse_response(body: &str) -> Result<Vec<ResultRecord>, ProviderError> {
        let response: SearchResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse JSON: {e}")))?;

        Ok(response
            .result_list
            .map(|list| list.result)
            .unwrap_or_default()
            .into_iter()
            .map(Self::convert_result)
            .collect())
    }

    /// Map one hit, building the canonical link from its own source tag
    fn convert_result(result: EuropePmcResult) -> ResultRecord {
        let link = links::europe_pmc(
            result.source.as_deref().unwrap_or(DEFAULT_SOURCE),
            result.id.as_deref().unwrap_or_default(),
        );

        ResultRecord {
            identifier: result.id.unwrap_or_else(|| DASH.to_string()),
            title: result.title.unwrap_or_else(|| DASH.to_string()),
            authors: result
                .author_string
                .map(|authors| authors.trim().to_string())
                .unwrap_or_default(),
            abstract_text: result
                .abstract_text
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| NO_ABSTRACT.to_string()),
            venue: result.source.unwrap_or_else(|| DASH.to_string()),
            record_type: result.pub_type.unwrap_or_else(|| DASH.to_string()),
            link,
            ..ResultRecord::default()
        }
    }
}

#[async_trait]
impl SourceProvider for EuropePmcProvider {
    fn name(&self) -> &'static str {
        "europe_pmc"
    }

    fn label(&self) -> &'static str {
        "Europe PMC"
    }

    fn description(&self) -> &'static str {
        "Europe PMC - life-sciences literature aggregator"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Literature
    }

    #[instrument(skip(self), fields(query = %query.query, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError> {
        let start_time = Instant::now();
        info!("Searching Europe PMC for: {}", query.query);

        let url = format!("{}/search", self.base_url);
        let page_size = query.limit.to_string();
        debug!("Europe PMC search URL: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query.query.as_str()),
                ("format", "json"),
                ("pageSize", page_size.as_str()),
                ("resultType", "core"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_request(&e, self.timeout))?;

        if response.status() != StatusCode::OK {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_request(&e, self.timeout))?;
        debug!("Europe PMC response size: {} bytes", body.len());

        let mut records = Self::parse_response(&body)?;
        records.truncate(query.limit);

        info!(
            "Europe PMC search completed: {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }

    fn error_title(&self, err: &ProviderError) -> String {
        match err {
            ProviderError::Status(code) => format!("Error HTTP {code}"),
            ProviderError::Timeout(after) => timeout_title(self.label(), *after),
            other => format!("Error en Europe PMC: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_maps_fields() {
        let body = r#"{
            "hitCount": 2,
            "resultList": {"result": [
                {"id": "38012345", "source": "MED", "pmid": "38012345",
                 "title": "Semaglutide in obesity", "authorString": "Lincoff AM, Brown-Frandsen K.",
                 "pubType": "research-article; journal article"},
                {"id": "PPR123", "source": "PPR"}
            ]}
        }"#;

        let records = EuropePmcProvider::parse_response(body).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].identifier, "38012345");
        assert_eq!(records[0].title, "Semaglutide in obesity");
        assert_eq!(records[0].venue, "MED");
        assert_eq!(records[0].record_type, "research-article; journal article");
        assert_eq!(records[0].authors, "Lincoff AM, Brown-Frandsen K.");
        assert_eq!(records[0].abstract_text, NO_ABSTRACT);
        assert_eq!(records[0].link, "https://europepmc.org/article/MED/38012345");

        assert_eq!(records[1].title, "-");
        assert_eq!(records[1].record_type, "-");
        assert_eq!(records[1].link, "https://europepmc.org/article/PPR/PPR123");
    }

    #[test]
    fn test_missing_source_and_id_defaults() {
        let records = EuropePmcProvider::parse_response(r#"{"resultList": {"result": [{}]}}"#).unwrap();
        assert_eq!(records[0].identifier, "-");
        assert_eq!(records[0].venue, "-");
        assert_eq!(records[0].link, "https://europepmc.org/article/MED/");
    }

    #[test]
    fn test_missing_result_list_is_empty() {
        assert!(EuropePmcProvider::parse_response(r#"{"hitCount": 0}"#).unwrap().is_empty());
        assert!(matches!(
            EuropePmcProvider::parse_response("<html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_titles() {
        let provider =
            EuropePmcProvider::new(&EuropePmcConfig::default(), &HttpClientConfig::default()).unwrap();
        assert_eq!(provider.error_title(&ProviderError::Status(404)), "Error HTTP 404");
        assert!(provider
            .error_title(&ProviderError::InvalidResponse("eof".to_string()))
            .starts_with("Error en Europe PMC: "));
    }
}
