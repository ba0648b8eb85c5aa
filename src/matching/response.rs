use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::entity::ExampleEntity;
use crate::core::types::Total;
use crate::matching::registry::AlgorithmInfo;
use crate::matching::scoring::MatchEntry;

/// Outcome of one named query in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    EntityMatches {
        status: u16,
        results: Vec<MatchEntry>,
        total: Total,
        /// The example as parsed and normalized
        query: ExampleEntity,
    },
    PartialError {
        status: u16,
        detail: String,
    },
}

impl QueryResponse {
    #[must_use]
    pub fn matches(results: Vec<MatchEntry>, total: Total, query: ExampleEntity) -> Self {
        Self::EntityMatches {
            status: 200,
            results,
            total,
            query,
        }
    }

    pub fn error(status: u16, detail: impl Into<String>) -> Self {
        Self::PartialError {
            status,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::EntityMatches { status, .. } | Self::PartialError { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::PartialError { .. })
    }

    /// Scored entries, empty for errors
    #[must_use]
    pub fn results(&self) -> &[MatchEntry] {
        match self {
            Self::EntityMatches { results, .. } => results,
            Self::PartialError { .. } => &[],
        }
    }
}

/// Response to a batch match request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub responses: BTreeMap<String, QueryResponse>,
    /// The algorithm that scored the batch
    pub matcher: AlgorithmInfo,
    /// Applied result limit per query
    pub limit: usize,
}

impl BatchResponse {
    /// Number of queries processed
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.responses.len()
    }
}

/// Collects per-entry outcomes into a [`BatchResponse`].
///
/// Each name is recorded once; a later outcome for the same name replaces
/// the earlier one.
#[derive(Debug)]
pub struct BatchAssembler {
    matcher: AlgorithmInfo,
    limit: usize,
    responses: BTreeMap<String, QueryResponse>,
}

impl BatchAssembler {
    #[must_use]
    pub fn new(matcher: AlgorithmInfo, limit: usize) -> Self {
        Self {
            matcher,
            limit,
            responses: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, name: String, response: QueryResponse) {
        self.responses.insert(name, response);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    #[must_use]
    pub fn finish(self) -> BatchResponse {
        BatchResponse {
            responses: self.responses,
            matcher: self.matcher,
            limit: self.limit,
        }
    }
}
