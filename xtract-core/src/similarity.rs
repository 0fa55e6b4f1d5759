//! Embedding-similarity search and paper recommendations.

use std::sync::Arc;

use crate::corpus::{Corpus, RawRecord};
use crate::embeddings::Encoder;
use crate::error::{IndexError, LoadError, QueryError};
use crate::index::{query_text, Metric, VectorIndex};
use crate::keyword::EMPTY_QUERY;
use crate::normalize::{normalize, SearchResult};
use crate::resolver::{decode_id, IdentifierResolver};

/// Default number of recommendations.
pub const DEFAULT_TOP_K: usize = 6;

/// Nearest-neighbour search over a vector index aligned with the corpus.
pub struct SimilarityEngine {
    corpus: Arc<Corpus>,
    resolver: Arc<IdentifierResolver>,
    index: Box<dyn VectorIndex>,
    encoder: Box<dyn Encoder>,
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("vectors", &self.index.len())
            .field("dimensions", &self.index.dimensions())
            .field("metric", &self.index.metric())
            .field("encoder", &self.encoder.provider_name())
            .finish()
    }
}

impl SimilarityEngine {
    /// Wire an engine, checking that the index lines up with the corpus and
    /// the encoder.
    pub fn new(
        corpus: Arc<Corpus>,
        resolver: Arc<IdentifierResolver>,
        index: Box<dyn VectorIndex>,
        encoder: Box<dyn Encoder>,
    ) -> Result<Self, LoadError> {
        if index.len() != corpus.len() {
            return Err(LoadError::RowCountMismatch {
                rows: index.len(),
                records: corpus.len(),
            });
        }
        if encoder.dimensions() != index.dimensions() {
            return Err(LoadError::Index {
                message: format!(
                    "encoder '{}' produces {} dimensions but the index has {}; set encoder.dimensions",
                    encoder.provider_name(),
                    encoder.dimensions(),
                    index.dimensions()
                ),
            });
        }
        Ok(Self {
            corpus,
            resolver,
            index,
            encoder,
        })
    }

    pub fn metric(&self) -> Metric {
        self.index.metric()
    }

    pub fn vector_count(&self) -> usize {
        self.index.len()
    }

    /// Papers most similar to `paper_id`, excluding the paper itself.
    pub async fn recommend(
        &self,
        paper_id: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let row = self.resolver.resolve(paper_id)?;
        let record = self.record(row)?;
        let self_id = record.id().to_string();
        let requested = decode_id(paper_id);
        let requested = requested.trim();

        let query = self.encoder.encode(&query_text(record)).await?;
        let hits = self.index.search(&query, top_k + 1)?;

        let mut results = Vec::with_capacity(top_k);
        for hit in hits {
            let neighbor = self.record(hit.row)?;
            if neighbor.id() == self_id || neighbor.id() == requested {
                continue;
            }
            results.push(SearchResult::scored(normalize(neighbor, None), hit.score));
            if results.len() == top_k {
                break;
            }
        }
        tracing::debug!(paper_id = %self_id, hits = results.len(), "Recommendations");
        Ok(results)
    }

    /// Papers nearest to free text. No self exclusion.
    pub async fn search(
        &self,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::invalid(EMPTY_QUERY));
        }
        let query = self.encoder.encode(text).await?;
        let hits = self.index.search(&query, top_k)?;
        hits.into_iter()
            .map(|hit| {
                self.record(hit.row)
                    .map(|record| SearchResult::scored(normalize(record, None), hit.score))
            })
            .collect()
    }

    fn record(&self, row: usize) -> Result<&RawRecord, QueryError> {
        self.corpus
            .get(row)
            .ok_or_else(|| IndexError::DanglingRow { row }.into())
    }
}
