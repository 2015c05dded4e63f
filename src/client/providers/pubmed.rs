use super::traits::{timeout_title, ProviderError, SearchQuery, SourceKind, SourceProvider};
use crate::client::medline::{self, MedlineRecord};
use crate::client::record::join_values;
use crate::client::{links, HttpClientConfig, ResultRecord, NO_ABSTRACT, NO_TITLE};
use crate::config::PubMedConfig;
use async_trait::async_trait;
use reqwest::Client;
use roxmltree::{Document, ParsingOptions};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// PubMed provider backed by the NCBI E-utilities.
///
/// Searches run in two phases: `esearch` resolves the query to an ordered list
/// of PMIDs, then a single `efetch` call pulls MEDLINE records for exactly
/// those ids.
pub struct PubMedProvider {
    client: Client,
    base_url: String,
    tool: String,
    email: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl PubMedProvider {
    /// Create a new PubMed provider
    pub fn new(config: &PubMedConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http
            .build_client()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tool: config.tool.clone(),
            email: config.email.clone(),
            api_key: config.api_key.clone(),
            timeout: http.timeout(),
        })
    }

    /// Parameters NCBI asks every client to send
    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string()), ("tool", self.tool.clone())];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn get_text(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<String, ProviderError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!("PubMed request: {}", url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::from_request(&e, self.timeout))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::from_request(&e, self.timeout))
    }

    /// Phase 1: resolve the query to at most `limit` PMIDs
    async fn esearch(&self, query: &SearchQuery) -> Result<Vec<String>, ProviderError> {
        let mut params = self.base_params();
        params.push(("term", query.query.clone()));
        params.push(("retmax", query.limit.to_string()));

        let body = self.get_text("esearch.fcgi", &params).await?;
        Self::parse_id_list(&body, query.limit)
    }

    /// Phase 2: fetch MEDLINE records for the given PMIDs in one call
    async fn efetch(&self, ids: &[String]) -> Result<Vec<ResultRecord>, ProviderError> {
        let mut params = self.base_params();
        params.push(("id", ids.join(",")));
        params.push(("rettype", "medline".to_string()));
        params.push(("retmode", "text".to_string()));

        let body = self.get_text("efetch.fcgi", &params).await?;
        let records = medline::parse(&body);

        if records.is_empty() && body.trim_start().starts_with('<') {
            return Err(ProviderError::InvalidResponse(
                "efetch returned markup instead of MEDLINE text".to_string(),
            ));
        }

        Ok(records.iter().map(Self::convert_record).collect())
    }

    /// Extract the ordered `IdList` from an esearch XML document
    fn parse_id_list(xml: &str, limit: usize) -> Result<Vec<String>, ProviderError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(xml, options)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse esearch XML: {e}")))?;

        if let Some(message) = doc
            .descendants()
            .find(|n| n.has_tag_name("ERROR"))
            .and_then(|n| n.text())
        {
            return Err(ProviderError::Other(format!("esearch error: {}", message.trim())));
        }

        let ids = doc
            .descendants()
            .filter(|n| n.has_tag_name("Id"))
            .filter(|n| n.parent().is_some_and(|p| p.has_tag_name("IdList")))
            .filter_map(|n| n.text())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .take(limit)
            .map(str::to_string)
            .collect();

        Ok(ids)
    }

    /// Convert a MEDLINE record to a `ResultRecord`
    fn convert_record(record: &MedlineRecord) -> ResultRecord {
        let pmid = record.first("PMID").unwrap_or_default().to_string();

        ResultRecord {
            link: links::pubmed(&pmid),
            title: record.first("TI").unwrap_or(NO_TITLE).to_string(),
            authors: join_values(record.all("AU")),
            abstract_text: record.first("AB").unwrap_or(NO_ABSTRACT).to_string(),
            venue: record.first("SO").unwrap_or_default().to_string(),
            record_type: join_values(record.all("PT")),
            identifier: pmid,
            ..ResultRecord::default()
        }
    }
}

#[async_trait]
impl SourceProvider for PubMedProvider {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    fn label(&self) -> &'static str {
        "PubMed"
    }

    fn description(&self) -> &'static str {
        "PubMed - NCBI biomedical literature database"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Literature
    }

    #[instrument(skip(self), fields(query = %query.query, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError> {
        let start_time = Instant::now();
        info!("Searching PubMed for: {}", query.query);

        let ids = self.esearch(query).await?;
        if ids.is_empty() {
            info!("PubMed returned no ids for: {}", query.query);
            return Ok(Vec::new());
        }
        debug!("PubMed esearch returned {} ids", ids.len());

        let mut records = self.efetch(&ids).await?;
        if records.len() != ids.len() {
            warn!(
                "PubMed efetch returned {} records for {} ids",
                records.len(),
                ids.len()
            );
        }
        records.truncate(query.limit);

        info!(
            "PubMed search completed: {} records in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }

    fn error_title(&self, err: &ProviderError) -> String {
        match err {
            ProviderError::Status(code) => format!("Error HTTP {code}"),
            ProviderError::Timeout(after) => timeout_title(self.label(), *after),
            ProviderError::InvalidResponse(_) => "Respuesta inválida de PubMed".to_string(),
            _ => "Error al buscar en PubMed".to_string(),
        }
    }

    /// PubMed sentinels carry the failure message in the abstract slot
    fn error_record(&self, err: &ProviderError) -> ResultRecord {
        ResultRecord {
            abstract_text: err.to_string(),
            ..ResultRecord::error(self.error_title(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESEARCH: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE eSearchResult PUBLIC "-//NLM//DTD esearch 20060628//EN" "https://eutils.ncbi.nlm.nih.gov/eutils/dtd/20060628/esearch.dtd">
<eSearchResult><Count>3</Count><RetMax>3</RetMax><RetStart>0</RetStart><IdList>
<Id>38012345</Id>
<Id>37990001</Id>
<Id>37880002</Id>
</IdList><TranslationSet/></eSearchResult>"#;

    fn provider() -> PubMedProvider {
        PubMedProvider::new(&PubMedConfig::default(), &HttpClientConfig::default()).unwrap()
    }

    #[test]
    fn test_provider_interface() {
        let provider = provider();
        assert_eq!(provider.name(), "pubmed");
        assert_eq!(provider.kind(), SourceKind::Literature);
    }

    #[test]
    fn test_parse_id_list_with_doctype() {
        let ids = PubMedProvider::parse_id_list(ESEARCH, 10).unwrap();
        assert_eq!(ids, ["38012345", "37990001", "37880002"]);

        let ids = PubMedProvider::parse_id_list(ESEARCH, 2).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_parse_id_list_empty_and_invalid() {
        let empty = "<eSearchResult><Count>0</Count><IdList/></eSearchResult>";
        assert!(PubMedProvider::parse_id_list(empty, 10).unwrap().is_empty());

        assert!(matches!(
            PubMedProvider::parse_id_list("{\"not\": \"xml\"}", 10),
            Err(ProviderError::InvalidResponse(_))
        ));

        let error = "<eSearchResult><ERROR>Invalid db name specified: pubmedx</ERROR></eSearchResult>";
        assert!(matches!(
            PubMedProvider::parse_id_list(error, 10),
            Err(ProviderError::Other(_))
        ));
    }

    #[test]
    fn test_convert_record_placeholders() {
        let records = medline::parse("PMID- 123\nSO  - Lancet. 2024.\n");
        let record = PubMedProvider::convert_record(&records[0]);

        assert_eq!(record.identifier, "123");
        assert_eq!(record.title, NO_TITLE);
        assert_eq!(record.abstract_text, NO_ABSTRACT);
        assert_eq!(record.authors, "");
        assert_eq!(record.venue, "Lancet. 2024.");
        assert_eq!(record.link, "https://pubmed.ncbi.nlm.nih.gov/123/");
    }

    #[test]
    fn test_error_record_carries_message() {
        let provider = provider();

        let record = provider.error_record(&ProviderError::Network("connection reset".to_string()));
        assert!(record.is_error());
        assert_eq!(record.title, "Error al buscar en PubMed");
        assert_eq!(record.abstract_text, "Network error: connection reset");

        let record = provider.error_record(&ProviderError::InvalidResponse("bad xml".to_string()));
        assert_eq!(record.title, "Respuesta inválida de PubMed");
    }
}
