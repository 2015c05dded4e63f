//! Parser for the MEDLINE flat format returned by `efetch` with
//! `rettype=medline&retmode=text`.
//!
//! ```text
//! PMID- 38012345
//! TI  - A long title that wraps
//!       onto a continuation line.
//! AU  - Smith J
//! AU  - Doe A
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// One citation as a multimap of MEDLINE tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedlineRecord {
    fields: HashMap<String, Vec<String>>,
}

impl MedlineRecord {
    /// First value of a tag
    #[must_use]
    pub fn first(&self, tag: &str) -> Option<&str> {
        self.fields
            .get(tag)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a repeated tag, in order
    #[must_use]
    pub fn all(&self, tag: &str) -> &[String] {
        self.fields.get(tag).map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push(&mut self, tag: &str, value: &str) {
        self.fields
            .entry(tag.to_string())
            .or_default()
            .push(value.trim().to_string());
    }

    fn extend_last(&mut self, tag: &str, continuation: &str) {
        if let Some(last) = self.fields.get_mut(tag).and_then(|values| values.last_mut()) {
            if !last.is_empty() {
                last.push(' ');
            }
            last.push_str(continuation.trim());
        }
    }
}

fn field_line() -> &'static Regex {
    static FIELD_LINE: OnceLock<Regex> = OnceLock::new();
    FIELD_LINE.get_or_init(|| {
        Regex::new(r"^([A-Z][A-Z0-9]{1,3}) *- ?(.*)$").expect("static MEDLINE pattern")
    })
}

/// Parse a MEDLINE text stream into records. Lines that are neither a field
/// nor a continuation are ignored.
#[must_use]
pub fn parse(text: &str) -> Vec<MedlineRecord> {
    let mut records = Vec::new();
    let mut current = MedlineRecord::default();
    let mut last_tag: Option<String> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            last_tag = None;
            continue;
        }

        if line.starts_with("      ") {
            if let Some(tag) = &last_tag {
                current.extend_last(tag, line);
            }
            continue;
        }

        if let Some(caps) = field_line().captures(line) {
            let tag = &caps[1];
            current.push(tag, &caps[2]);
            last_tag = Some(tag.to_string());
        }
    }

    if !current.is_empty() {
        records.push(current);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\nPMID- 38012345\nOWN - NLM\nTI  - Semaglutide and cardiovascular outcomes in obesity\n      without diabetes.\nAB  - Semaglutide reduced the incidence of death from\n      cardiovascular causes.\nAU  - Lincoff AM\nAU  - Brown-Frandsen K\nPT  - Journal Article\nPT  - Randomized Controlled Trial\nSO  - N Engl J Med. 2023 Dec 14;389(24):2221-2232.\n\nPMID- 38099999\nTI  - Second record\n";

    #[test]
    fn test_parse_two_records() {
        let records = parse(SAMPLE);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.first("PMID"), Some("38012345"));
        assert_eq!(
            first.first("TI"),
            Some("Semaglutide and cardiovascular outcomes in obesity without diabetes.")
        );
        assert_eq!(first.all("AU"), ["Lincoff AM", "Brown-Frandsen K"]);
        assert_eq!(first.all("PT").len(), 2);
        assert_eq!(first.first("OWN"), Some("NLM"));

        assert_eq!(records[1].first("PMID"), Some("38099999"));
        assert!(records[1].all("AU").is_empty());
        assert_eq!(records[1].first("AB"), None);
    }

    #[test]
    fn test_parse_ignores_markup_and_blank_input() {
        assert!(parse("").is_empty());
        assert!(parse("<html><body>Service unavailable</body></html>").is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let records = parse("PMID- 1\r\nTI  - Title\r\n      continued\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first("TI"), Some("Title continued"));
    }
}
