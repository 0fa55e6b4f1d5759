//! Keyword search: case-insensitive substring scan in corpus order.

use std::sync::Arc;

use crate::corpus::Corpus;
use crate::error::QueryError;
use crate::normalize::{normalize, SearchResult};

/// Default number of keyword results.
pub const DEFAULT_LIMIT: usize = 50;

/// Message returned for empty or whitespace-only queries.
pub const EMPTY_QUERY: &str = "Query cannot be empty.";

/// Substring search over a fixed set of text columns.
#[derive(Debug)]
pub struct KeywordSearchEngine {
    corpus: Arc<Corpus>,
    fields: Vec<String>,
    // Lower-cased text per record, one entry per present field.
    haystacks: Vec<Vec<String>>,
}

impl KeywordSearchEngine {
    /// Build an engine over `fields`, keeping only those present in the corpus.
    pub fn new(corpus: Arc<Corpus>, fields: &[String]) -> Self {
        let fields: Vec<String> = fields
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| corpus.has_column(f))
            .collect();
        if fields.is_empty() {
            tracing::warn!("No keyword search fields present in corpus; searches will be empty");
        }

        let haystacks = corpus
            .records()
            .iter()
            .map(|record| {
                fields
                    .iter()
                    .filter_map(|f| record.field(f))
                    .map(str::to_lowercase)
                    .collect()
            })
            .collect();

        Self {
            corpus,
            fields,
            haystacks,
        }
    }

    /// Columns actually searched.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Return up to `limit` records whose text fields contain `query`.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, QueryError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(QueryError::invalid(EMPTY_QUERY));
        }

        let results: Vec<SearchResult> = self
            .haystacks
            .iter()
            .enumerate()
            .filter(|(_, texts)| texts.iter().any(|t| t.contains(&needle)))
            .filter_map(|(row, _)| self.corpus.get(row))
            .take(limit)
            .map(|record| SearchResult::keyword(normalize(record, None)))
            .collect();

        tracing::debug!(query = %needle, hits = results.len(), "Keyword search");
        Ok(results)
    }
}
