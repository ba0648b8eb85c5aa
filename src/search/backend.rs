use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::entity::EntityRecord;
use crate::core::types::{Total, TraceToken};
use crate::search::query::SearchRequest;

/// A failed backend call. The status is passed through to callers unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Search backend error ({status}): {message}")]
pub struct BackendError {
    pub status: u16,
    pub message: String,
}

impl BackendError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The call did not complete within the configured timeout
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(504, "Search backend timed out")
    }

    /// The backend could not be reached
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(502, message)
    }
}

/// One bucket of a terms aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetBucket {
    pub name: String,
    pub count: u64,
}

/// Hits, total and facet buckets for one request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Records in rank order
    pub hits: Vec<EntityRecord>,
    pub total: Total,
    /// Buckets per aggregated field, if aggregations were requested
    pub facets: Option<BTreeMap<String, Vec<FacetBucket>>>,
}

impl SearchResult {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: Total::exact(0),
            facets: None,
        }
    }
}

/// A search index that can execute [`SearchRequest`]s.
///
/// Implementations must be safe to call concurrently; a batch of match
/// queries is dispatched in parallel against one backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute one request. The trace token identifies the inbound request
    /// on whose behalf the call is made.
    async fn search(
        &self,
        request: &SearchRequest,
        trace: &TraceToken,
    ) -> Result<SearchResult, BackendError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
