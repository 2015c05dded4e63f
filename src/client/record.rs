use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier of the record returned when an adapter failed outright
pub const ERROR_ID: &str = "error";

/// Identifier of the record returned when a scrape succeeded but showed nothing
pub const NO_DATA_ID: &str = "sin_datos";

/// Title used when a literature record has no title upstream
pub const NO_TITLE: &str = "Sin título disponible";

/// Abstract used when upstream has no abstract, and the summary of empty input
pub const NO_ABSTRACT: &str = "Resumen no disponible.";

/// Title of the `sin_datos` sentinel
pub const NO_VISIBLE_RESULTS: &str = "No se encontraron resultados visibles.";

/// Placeholder for missing scalar fields in the JSON trials API
pub const DASH: &str = "-";

/// Registry label used as venue on every trial record
pub const TRIALS_REGISTRY: &str = "ClinicalTrials.gov";

/// Normalized search result shared by every evidence source.
///
/// Every field is a plain string so the presentation layer can render a
/// record without knowing which provider produced it. Multi-valued upstream
/// fields are joined with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResultRecord {
    /// Provider primary key (PMID, Europe PMC id, NCT id) or a sentinel
    pub identifier: String,
    /// Human readable title, never empty for real records
    pub title: String,
    /// Author names joined with ", "
    pub authors: String,
    /// Upstream abstract, input of the summarizer
    pub abstract_text: String,
    /// Journal, source tag or registry name
    pub venue: String,
    /// Publication or study type as reported upstream
    pub record_type: String,
    /// Canonical absolute URL of the record
    pub link: String,
    /// Conditions studied (trials)
    pub condition: String,
    /// Recruitment status (trials)
    pub status: String,
    /// Trial phase
    pub phase: String,
    /// Location countries (trials)
    pub country: String,
    /// Study start date as reported upstream
    pub start_date: String,
    /// Lead sponsor (trials)
    pub sponsor: String,
}

impl ResultRecord {
    /// Create a record with just an identifier and a title
    #[must_use]
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Single-record stand-in for a failed search
    #[must_use]
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(ERROR_ID, title)
    }

    /// Single-record stand-in for a successful scrape with nothing to show
    #[must_use]
    pub fn no_data() -> Self {
        Self::new(NO_DATA_ID, NO_VISIBLE_RESULTS)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.identifier == ERROR_ID
    }

    #[must_use]
    pub fn is_no_data(&self) -> bool {
        self.identifier == NO_DATA_ID
    }

    /// Whether the presentation layer should show a notice instead of the record
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.is_error() || self.is_no_data()
    }
}

/// Canonical URL templates for records whose upstream does not supply a link
pub mod links {
    /// `https://pubmed.ncbi.nlm.nih.gov/{pmid}/`
    #[must_use]
    pub fn pubmed(pmid: &str) -> String {
        format!("https://pubmed.ncbi.nlm.nih.gov/{}/", urlencoding::encode(pmid))
    }

    /// `https://europepmc.org/article/{source}/{id}`
    #[must_use]
    pub fn europe_pmc(source: &str, id: &str) -> String {
        format!(
            "https://europepmc.org/article/{}/{}",
            urlencoding::encode(source),
            urlencoding::encode(id)
        )
    }

    /// Legacy registry page, `https://clinicaltrials.gov/ct2/show/{nct}`
    #[must_use]
    pub fn trial_legacy(nct_id: &str) -> String {
        format!("https://clinicaltrials.gov/ct2/show/{}", urlencoding::encode(nct_id))
    }

    /// Current registry page, `https://clinicaltrials.gov/study/{nct}`
    #[must_use]
    pub fn trial(nct_id: &str) -> String {
        format!("https://clinicaltrials.gov/study/{}", urlencoding::encode(nct_id))
    }
}

/// Join a list of upstream values the way every multi-valued field is rendered
pub fn join_values<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let err = ResultRecord::error("Error HTTP 500");
        assert!(err.is_error());
        assert!(err.is_sentinel());
        assert!(!err.is_no_data());
        assert_eq!(err.title, "Error HTTP 500");

        let empty = ResultRecord::no_data();
        assert_eq!(empty.identifier, "sin_datos");
        assert_eq!(empty.title, NO_VISIBLE_RESULTS);
        assert!(empty.is_sentinel());

        assert!(!ResultRecord::new("12345", "A title").is_sentinel());
    }

    #[test]
    fn test_link_templates() {
        assert_eq!(links::pubmed("123"), "https://pubmed.ncbi.nlm.nih.gov/123/");
        assert_eq!(
            links::europe_pmc("MED", "38012345"),
            "https://europepmc.org/article/MED/38012345"
        );
        assert_eq!(
            links::trial_legacy("NCT04000165"),
            "https://clinicaltrials.gov/ct2/show/NCT04000165"
        );
        assert_eq!(
            links::trial("NCT04000165"),
            "https://clinicaltrials.gov/study/NCT04000165"
        );
        assert_eq!(links::trial("-"), "https://clinicaltrials.gov/study/-");
    }

    #[test]
    fn test_join_values_keeps_every_entry() {
        assert_eq!(join_values(["Spain", "France"]), "Spain, France");
        assert_eq!(join_values(["", "Obesity"]), ", Obesity");
        assert_eq!(join_values(Vec::<String>::new()), "");
    }

    #[test]
    fn test_schema_exposes_identifier() {
        let schema = schemars::schema_for!(ResultRecord);
        let value = serde_json::to_value(&schema).unwrap();
        assert!(value["properties"]["identifier"].is_object());
    }
}
