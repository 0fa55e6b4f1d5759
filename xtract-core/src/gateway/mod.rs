//! # HTTP Gateway
//!
//! axum router over a shared [`PaperService`](crate::service::PaperService):
//! paper lookup, keyword or semantic search, and recommendations. All
//! origins, methods and headers are allowed; every request is traced.

mod error;
mod server;

pub use error::{ApiError, ApiResult};
pub use server::{router, run, RecommendParams, SearchParams, SharedService};
