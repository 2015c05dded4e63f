use super::traits::{timeout_title, ProviderError, SearchQuery, SourceKind, SourceProvider};
use crate::client::record::{DASH, TRIALS_REGISTRY};
use crate::client::{links, HttpClientConfig, ResultRecord};
use crate::config::TrialsConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// ClinicalTrials.gov through the versioned `studies` JSON endpoint.
///
/// The payload is loosely typed, so fields are read straight off the JSON
/// tree and anything missing or non-scalar becomes `"-"`.
pub struct JsonTrialsProvider {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl JsonTrialsProvider {
    pub fn new(config: &TrialsConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http
            .build_client()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.json_api_url.clone(),
            timeout: http.timeout(),
        })
    }

    /// Parse a `studies` response body
    pub fn parse_response(body: &str) -> Result<Vec<ResultRecord>, ProviderError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse JSON: {e}")))?;

        let studies = match value.get("studies") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(studies)) => studies,
            Some(_) => return Err(ProviderError::Parse("`studies` is not a list".to_string())),
        };

        Ok(studies.iter().map(Self::convert_study).collect())
    }

    fn convert_study(study: &Value) -> ResultRecord {
        let nct_id = scalar(study.get("nctId"));

        ResultRecord {
            link: links::trial(&nct_id),
            title: scalar(study.get("studyTitle")),
            venue: TRIALS_REGISTRY.to_string(),
            status: scalar(study.get("recruitmentStatus")),
            phase: scalar(study.get("phase")),
            sponsor: scalar(study.get("sponsor").and_then(|sponsor| sponsor.get("name"))),
            identifier: nct_id,
            ..ResultRecord::default()
        }
    }
}

/// Render a scalar JSON value, `"-"` for anything else
fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => DASH.to_string(),
    }
}

#[async_trait]
impl SourceProvider for JsonTrialsProvider {
    fn name(&self) -> &'static str {
        "clinical_trials_json"
    }

    fn label(&self) -> &'static str {
        TRIALS_REGISTRY
    }

    fn description(&self) -> &'static str {
        "ClinicalTrials.gov - versioned studies JSON API"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Trials
    }

    #[instrument(skip(self), fields(query = %query.query, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError> {
        let start_time = Instant::now();
        info!("Searching ClinicalTrials.gov (studies API) for: {}", query.query);

        let size = query.limit.to_string();
        debug!("studies API URL: {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("term", query.query.as_str()),
                ("page", "1"),
                ("size", size.as_str()),
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

        let mut records = Self::parse_response(&body)?;
        records.truncate(query.limit);

        info!(
            "studies API search completed: {} studies in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }

    fn error_title(&self, err: &ProviderError) -> String {
        match err {
            ProviderError::Status(code) => format!("Error HTTP {code}"),
            ProviderError::Timeout(after) => timeout_title(self.label(), *after),
            other => format!("Error en API interna: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_with_defaults() {
        let body = r#"{"studies": [
            {"nctId": "NCT04000165", "studyTitle": "Semaglutide Effects on Heart Disease",
             "recruitmentStatus": "COMPLETED", "phase": "PHASE3", "sponsor": {"name": "Novo Nordisk A/S"}},
            {"nctId": "NCT05000001", "phase": null, "sponsor": {}}
        ]}"#;

        let records = JsonTrialsProvider::parse_response(body).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].identifier, "NCT04000165");
        assert_eq!(records[0].status, "COMPLETED");
        assert_eq!(records[0].phase, "PHASE3");
        assert_eq!(records[0].sponsor, "Novo Nordisk A/S");
        assert_eq!(records[0].link, "https://clinicaltrials.gov/study/NCT04000165");

        assert_eq!(records[1].title, "-");
        assert_eq!(records[1].status, "-");
        assert_eq!(records[1].phase, "-");
        assert_eq!(records[1].sponsor, "-");
    }

    #[test]
    fn test_missing_studies_is_empty() {
        assert!(JsonTrialsProvider::parse_response("{}").unwrap().is_empty());
        assert!(matches!(
            JsonTrialsProvider::parse_response(r#"{"studies": "none"}"#),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_error_title_names_the_internal_api() {
        let provider =
            JsonTrialsProvider::new(&TrialsConfig::default(), &HttpClientConfig::default()).unwrap();
        assert_eq!(
            provider.error_title(&ProviderError::InvalidResponse("eof".to_string())),
            "Error en API interna: Invalid response: eof"
        );
        assert_eq!(provider.error_title(&ProviderError::Status(500)), "Error HTTP 500");
    }
}
