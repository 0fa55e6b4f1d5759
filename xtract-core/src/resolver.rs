//! Identifier resolution.
//!
//! Maps a caller-supplied id to one corpus row. Steps, first match wins:
//! exact equality, case-insensitive equality, case-insensitive substring
//! (first row in corpus order).

use std::collections::HashMap;
use std::sync::Arc;

use crate::corpus::{Corpus, RawRecord};
use crate::error::QueryError;

/// Which resolution step produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    CaseInsensitive,
    Substring,
}

/// Precomputed id lookups over a corpus.
#[derive(Debug)]
pub struct IdentifierResolver {
    corpus: Arc<Corpus>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
    folded_ids: Vec<String>,
}

impl IdentifierResolver {
    pub fn new(corpus: Arc<Corpus>) -> Self {
        let mut exact = HashMap::with_capacity(corpus.len());
        let mut folded = HashMap::with_capacity(corpus.len());
        let mut folded_ids = Vec::with_capacity(corpus.len());
        for (row, record) in corpus.records().iter().enumerate() {
            let lower = record.id().to_lowercase();
            // First row wins for duplicated ids.
            exact.entry(record.id().to_string()).or_insert(row);
            folded.entry(lower.clone()).or_insert(row);
            folded_ids.push(lower);
        }
        Self {
            corpus,
            exact,
            folded,
            folded_ids,
        }
    }

    /// Resolve `id` to a corpus row.
    pub fn resolve(&self, id: &str) -> Result<usize, QueryError> {
        self.resolve_with_kind(id).map(|(row, _)| row)
    }

    /// Resolve `id` to a record.
    pub fn resolve_record(&self, id: &str) -> Result<&RawRecord, QueryError> {
        let row = self.resolve(id)?;
        self.corpus
            .get(row)
            .ok_or_else(|| QueryError::internal(format!("Resolved row {} is out of range", row)))
    }

    /// Resolve `id` and report which step matched.
    pub fn resolve_with_kind(&self, id: &str) -> Result<(usize, MatchKind), QueryError> {
        let decoded = decode_id(id);
        let query = decoded.trim();
        if query.is_empty() {
            return Err(QueryError::not_found(id));
        }

        if let Some(&row) = self.exact.get(query) {
            return Ok((row, MatchKind::Exact));
        }

        let lower = query.to_lowercase();
        if let Some(&row) = self.folded.get(&lower) {
            tracing::debug!(id = %query, row, "Resolved id case-insensitively");
            return Ok((row, MatchKind::CaseInsensitive));
        }

        if let Some(row) = self.folded_ids.iter().position(|c| c.contains(&lower)) {
            tracing::debug!(id = %query, row, "Resolved id by substring");
            return Ok((row, MatchKind::Substring));
        }

        Err(QueryError::not_found(query))
    }
}

/// Percent-decode an identifier; malformed encodings are used verbatim.
pub fn decode_id(id: &str) -> String {
    match urlencoding::decode(id) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => id.to_string(),
    }
}
