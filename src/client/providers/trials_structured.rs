use super::traits::{timeout_title, ProviderError, SearchQuery, SourceKind, SourceProvider};
use crate::client::record::{join_values, TRIALS_REGISTRY};
use crate::client::{links, HttpClientConfig, ResultRecord};
use crate::config::TrialsConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Fields projected from the legacy study_fields endpoint
const STUDY_FIELDS: &[&str] = &[
    "NCTId",
    "BriefTitle",
    "Condition",
    "OverallStatus",
    "Phase",
    "LocationCountry",
    "StartDate",
    "LeadSponsorName",
    "StudyType",
];

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "StudyFieldsResponse")]
    response: StudyFieldsResponse,
}

#[derive(Debug, Deserialize)]
struct StudyFieldsResponse {
    #[serde(rename = "StudyFields", default)]
    study_fields: Vec<HashMap<String, Value>>,
}

/// ClinicalTrials.gov through the legacy field-projection API.
///
/// Every projected field comes back wrapped in a list, even scalar ones, so
/// scalars are unwrapped from index 0 (or `""` when the list is empty) and
/// multi-valued fields are joined.
pub struct StructuredTrialsProvider {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl StructuredTrialsProvider {
    pub fn new(config: &TrialsConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http
            .build_client()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.structured_url.clone(),
            timeout: http.timeout(),
        })
    }

    /// Parse a study_fields JSON body.
    ///
    /// A body that is not JSON is an [`ProviderError::InvalidResponse`]; JSON
    /// without the `StudyFieldsResponse` envelope is a [`ProviderError::Parse`].
    pub fn parse_response(body: &str) -> Result<Vec<ResultRecord>, ProviderError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse JSON: {e}")))?;
        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(envelope
            .response
            .study_fields
            .iter()
            .map(Self::convert_study)
            .collect())
    }

    fn convert_study(study: &HashMap<String, Value>) -> ResultRecord {
        let nct_id = first(study, "NCTId");

        ResultRecord {
            link: links::trial_legacy(&nct_id),
            title: first(study, "BriefTitle"),
            venue: TRIALS_REGISTRY.to_string(),
            record_type: first(study, "StudyType"),
            condition: joined(study, "Condition"),
            status: first(study, "OverallStatus"),
            phase: first(study, "Phase"),
            country: joined(study, "LocationCountry"),
            start_date: first(study, "StartDate"),
            sponsor: first(study, "LeadSponsorName"),
            identifier: nct_id,
            ..ResultRecord::default()
        }
    }
}

/// Index 0 of a list-wrapped field, or an empty string
fn first(study: &HashMap<String, Value>, field: &str) -> String {
    study
        .get(field)
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// All string values of a list-wrapped field joined with ", "
fn joined(study: &HashMap<String, Value>, field: &str) -> String {
    study
        .get(field)
        .and_then(Value::as_array)
        .map(|values| join_values(values.iter().filter_map(Value::as_str)))
        .unwrap_or_default()
}

#[async_trait]
impl SourceProvider for StructuredTrialsProvider {
    fn name(&self) -> &'static str {
        "clinical_trials_structured"
    }

    fn label(&self) -> &'static str {
        TRIALS_REGISTRY
    }

    fn description(&self) -> &'static str {
        "ClinicalTrials.gov - legacy study_fields API"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Trials
    }

    #[instrument(skip(self), fields(query = %query.query, limit = query.limit))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultRecord>, ProviderError> {
        let start_time = Instant::now();
        info!("Searching ClinicalTrials.gov (study_fields) for: {}", query.query);

        let fields = STUDY_FIELDS.join(",");
        let max_rank = query.limit.to_string();
        debug!("study_fields URL: {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("expr", query.query.as_str()),
                ("fields", fields.as_str()),
                ("min_rnk", "1"),
                ("max_rnk", max_rank.as_str()),
                ("fmt", "json"),
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
            "study_fields search completed: {} studies in {:?}",
            records.len(),
            start_time.elapsed()
        );
        Ok(records)
    }

    fn error_title(&self, err: &ProviderError) -> String {
        match err {
            ProviderError::Status(code) => format!("Error HTTP {code}"),
            ProviderError::Timeout(after) => timeout_title(self.label(), *after),
            ProviderError::InvalidResponse(_) => {
                "Respuesta inválida de ClinicalTrials.gov".to_string()
            }
            other => format!("Error al buscar en ClinicalTrials.gov: {other}"),
        }
    }
}
