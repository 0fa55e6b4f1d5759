//! Response normalization.
//!
//! Dataset schemas drift between deployments (`citations` vs `citation_count`,
//! `journal` vs `venue`, several date columns). This module is the only place
//! that knows about those aliases; everything it produces has every field
//! populated.

use serde::{Deserialize, Serialize};

use crate::corpus::RawRecord;

pub const DEFAULT_ID: &str = "unknown";
pub const DEFAULT_TITLE: &str = "No title";
pub const DEFAULT_AUTHORS: &str = "Unknown authors";
pub const DEFAULT_DATE: &str = "Unknown date";
pub const DEFAULT_JOURNAL: &str = "arXiv";

const DATE_FIELDS: &[&str] = &["update_date", "date", "published_date"];
const CITATION_FIELDS: &[&str] = &["citations", "citation_count"];
const JOURNAL_FIELDS: &[&str] = &["journal", "venue"];

/// Stable output shape for a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub update_date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub citations: u64,
    pub journal: String,
    pub doi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_code: Option<String>,
}

/// A normalized paper plus an optional similarity score.
///
/// `similarity` is only set by the similarity engine and carries the index
/// metric verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub paper: PaperRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl SearchResult {
    pub fn keyword(paper: PaperRecord) -> Self {
        Self {
            paper,
            similarity: None,
        }
    }

    pub fn scored(paper: PaperRecord, similarity: f32) -> Self {
        Self {
            paper,
            similarity: Some(similarity),
        }
    }
}

/// Normalize a raw record. `fallback_id` is used when the record carries no id
/// (the caller's query id, typically).
pub fn normalize(raw: &RawRecord, fallback_id: Option<&str>) -> PaperRecord {
    let id = Some(raw.id())
        .filter(|id| !id.trim().is_empty())
        .or(fallback_id.filter(|id| !id.trim().is_empty()))
        .unwrap_or(DEFAULT_ID);

    PaperRecord {
        id: id.to_string(),
        title: text_or(raw.field("title"), DEFAULT_TITLE),
        authors: text_or(raw.field("authors"), DEFAULT_AUTHORS),
        update_date: text_or(raw.first_field(DATE_FIELDS), DEFAULT_DATE),
        abstract_text: text_or(raw.field("abstract"), ""),
        citations: raw
            .first_field(CITATION_FIELDS)
            .map(parse_count)
            .unwrap_or(0),
        journal: text_or(raw.first_field(JOURNAL_FIELDS), DEFAULT_JOURNAL),
        doi: text_or(raw.field("doi"), ""),
        category_code: raw.field("category_code").map(str::to_string),
    }
}

fn text_or(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}

/// Parse a citation count. Accepts float text written by dataframe exports
/// (`"12.0"`); anything unparseable or negative counts as zero.
fn parse_count(value: &str) -> u64 {
    let value = value.trim();
    if let Ok(n) = value.parse::<u64>() {
        return n;
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => f as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_full_record() {
        let raw = RawRecord::new(
            "1001",
            [
                ("title", "Graph Neural Networks"),
                ("abstract", "A survey of GNNs"),
                ("authors", "A. Smith"),
                ("update_date", "2020-01-01"),
                ("category_code", "cs.LG"),
            ],
        );
        let paper = normalize(&raw, None);
        assert_eq!(
            paper,
            PaperRecord {
                id: "1001".into(),
                title: "Graph Neural Networks".into(),
                authors: "A. Smith".into(),
                update_date: "2020-01-01".into(),
                abstract_text: "A survey of GNNs".into(),
                citations: 0,
                journal: "arXiv".into(),
                doi: "".into(),
                category_code: Some("cs.LG".into()),
            }
        );
    }

    #[test]
    fn test_normalize_missing_optional_fields() {
        let raw = RawRecord::new("42", [("title", "T")]);
        let paper = normalize(&raw, None);
        assert_eq!(paper.citations, 0);
        assert_eq!(paper.journal, "arXiv");
        assert_eq!(paper.doi, "");
        assert_eq!(paper.authors, "Unknown authors");
        assert_eq!(paper.update_date, "Unknown date");
        assert_eq!(paper.abstract_text, "");
        assert_eq!(paper.category_code, None);
    }

    #[test]
    fn test_normalize_empty_record_defaults() {
        let raw = RawRecord::new("", Vec::<(String, String)>::new());
        let paper = normalize(&raw, None);
        assert_eq!(paper.id, "unknown");
        assert_eq!(paper.title, "No title");
    }

    #[test]
    fn test_normalize_fallback_id() {
        let raw = RawRecord::new("", [("title", "T")]);
        assert_eq!(normalize(&raw, Some("2101.00001")).id, "2101.00001");
        assert_eq!(normalize(&raw, Some("  ")).id, "unknown");
    }

    #[test]
    fn test_date_aliases_in_priority_order() {
        let raw = RawRecord::new("1", [("published_date", "2019"), ("date", "2020")]);
        assert_eq!(normalize(&raw, None).update_date, "2020");

        let raw = RawRecord::new("1", [("published_date", "2019")]);
        assert_eq!(normalize(&raw, None).update_date, "2019");
    }

    #[test]
    fn test_citation_and_journal_aliases() {
        let raw = RawRecord::new(
            "1",
            [("citation_count", "17"), ("venue", "NeurIPS"), ("doi", "10.1/x")],
        );
        let paper = normalize(&raw, None);
        assert_eq!(paper.citations, 17);
        assert_eq!(paper.journal, "NeurIPS");
        assert_eq!(paper.doi, "10.1/x");
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12"), 12);
        assert_eq!(parse_count("12.0"), 12);
        assert_eq!(parse_count(" 3 "), 3);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count("-4"), 0);
        assert_eq!(parse_count("NaN"), 0);
    }

    #[test]
    fn test_search_result_serialization() {
        let raw = RawRecord::new("1", [("title", "T")]);
        let keyword = SearchResult::keyword(normalize(&raw, None));
        let json = serde_json::to_value(&keyword).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["abstract"], "");
        assert!(json.get("similarity").is_none());
        assert!(json.get("category_code").is_none());

        let scored = SearchResult::scored(normalize(&raw, None), 0.5);
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["similarity"], 0.5);
    }
}
