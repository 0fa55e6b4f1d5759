//! The paper service: explicit initialization and the query operations.
//!
//! [`PaperService::from_config`] loads the corpus and, when enabled, the
//! vector index and encoder. The result is immutable and shared by every
//! request handler behind an `Arc`.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{AppConfig, SearchMode};
use crate::corpus::Corpus;
use crate::embeddings::{create_encoder, Encoder};
use crate::error::{LoadError, QueryError};
use crate::index::{FlatIndex, VectorIndex};
use crate::keyword::KeywordSearchEngine;
use crate::normalize::{normalize, PaperRecord, SearchResult};
use crate::resolver::IdentifierResolver;
use crate::similarity::SimilarityEngine;

/// Greeting returned by the root endpoint.
pub const SERVICE_MESSAGE: &str = "xtract paper search and recommendation API is running";

/// Liveness snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub records: usize,
}

/// Read-only query surface over one loaded corpus.
#[derive(Debug)]
pub struct PaperService {
    config: AppConfig,
    corpus: Arc<Corpus>,
    resolver: Arc<IdentifierResolver>,
    keyword: KeywordSearchEngine,
    similarity: Option<SimilarityEngine>,
}

impl PaperService {
    /// Wire a service around an already-loaded corpus.
    pub fn new(corpus: Arc<Corpus>, config: AppConfig) -> Self {
        let resolver = Arc::new(IdentifierResolver::new(corpus.clone()));
        let keyword = KeywordSearchEngine::new(corpus.clone(), &config.corpus.text_fields);
        Self {
            config,
            corpus,
            resolver,
            keyword,
            similarity: None,
        }
    }

    /// Attach a similarity engine over `index`, encoding queries with the
    /// configured encoder.
    pub fn with_index(self, index: Box<dyn VectorIndex>) -> Result<Self, LoadError> {
        let encoder = create_encoder(&self.config.encoder)?;
        self.with_engine(index, encoder)
    }

    /// Attach a similarity engine over `index` and `encoder`.
    pub fn with_engine(
        mut self,
        index: Box<dyn VectorIndex>,
        encoder: Box<dyn Encoder>,
    ) -> Result<Self, LoadError> {
        let engine =
            SimilarityEngine::new(self.corpus.clone(), self.resolver.clone(), index, encoder)?;
        self.similarity = Some(engine);
        Ok(self)
    }

    /// Load everything the configuration asks for. Any failure is fatal.
    pub async fn from_config(config: AppConfig) -> Result<Self, LoadError> {
        let corpus = Corpus::load(&config.corpus.path)?;
        corpus.require_any_column(&config.corpus.text_fields)?;
        let corpus = Arc::new(corpus);

        let engine = if config.index.enabled {
            let encoder = create_encoder(&config.encoder)?;
            let index = load_index(&config, &corpus, encoder.as_ref()).await?;
            Some((index, encoder))
        } else {
            None
        };

        let service = Self::new(corpus, config);
        let service = match engine {
            Some((index, encoder)) => service.with_engine(Box::new(index), encoder)?,
            None => service,
        };
        tracing::info!(
            records = service.len(),
            similarity = service.similarity.is_some(),
            "Paper service ready"
        );
        Ok(service)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    pub fn has_similarity(&self) -> bool {
        self.similarity.is_some()
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            records: self.len(),
        }
    }

    /// Look up one paper by identifier.
    pub fn get_paper(&self, paper_id: &str) -> Result<PaperRecord, QueryError> {
        let record = self.resolver.resolve_record(paper_id)?;
        Ok(normalize(record, Some(paper_id)))
    }

    /// Search by keyword or by embedding similarity.
    ///
    /// `limit` defaults to `search.default_limit` and is capped at
    /// `search.max_limit`; `mode` defaults to `search.mode`.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        mode: Option<SearchMode>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let limit = self.cap(limit.unwrap_or(self.config.search.default_limit));
        match mode.unwrap_or(self.config.search.mode) {
            SearchMode::Keyword => self.keyword.search(query, limit),
            SearchMode::Semantic => self.semantic()?.search(query, limit).await,
        }
    }

    /// Papers most similar to `paper_id`, never including the paper itself.
    pub async fn recommend(
        &self,
        paper_id: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let top_k = self.cap(top_k.unwrap_or(self.config.recommend.default_top_k));
        self.semantic()?.recommend(paper_id, top_k).await
    }

    fn semantic(&self) -> Result<&SimilarityEngine, QueryError> {
        self.similarity
            .as_ref()
            .ok_or_else(|| QueryError::internal("similarity search is not configured"))
    }

    fn cap(&self, n: usize) -> usize {
        n.min(self.config.search.max_limit)
    }
}

async fn load_index(
    config: &AppConfig,
    corpus: &Corpus,
    encoder: &dyn Encoder,
) -> Result<FlatIndex, LoadError> {
    match &config.index.embeddings_path {
        Some(path) => FlatIndex::load_npy(path, config.index.metric),
        None => {
            FlatIndex::build(corpus, encoder, config.index.metric, config.encoder.concurrency)
                .await
        }
    }
}
