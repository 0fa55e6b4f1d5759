//! # Xtract Core
//!
//! Core library for the xtract paper search and recommendation service.
//! Provides the in-memory corpus, identifier resolution, keyword and
//! embedding-similarity search, response normalization, configuration, and
//! the HTTP gateway.

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod gateway;
pub mod index;
pub mod keyword;
pub mod normalize;
pub mod resolver;
pub mod service;
pub mod similarity;

// Re-export commonly used types at the crate root.
pub use config::{AppConfig, SearchMode};
pub use corpus::{Corpus, IdSource, RawRecord};
pub use embeddings::{create_encoder, Encoder, EncoderConfig, LocalEncoder};
pub use error::{
    ConfigError, EncoderError, IndexError, LoadError, QueryError, Result, XtractError,
};
pub use index::{FlatIndex, Metric, Neighbor, VectorIndex};
pub use keyword::KeywordSearchEngine;
pub use normalize::{normalize, PaperRecord, SearchResult};
pub use resolver::{IdentifierResolver, MatchKind};
pub use service::{Health, PaperService};
pub use similarity::SimilarityEngine;
