//! Batch matching.
//!
//! A batch is a map of caller-chosen names to example entities. Every entry is
//! validated and turned into a query on its own; the valid ones are sent to the
//! backend concurrently, one task each, and scored against their own example
//! once all of them have finished. A failure in one entry never affects the
//! others: it is reported as a partial error under that entry's name.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::config::Settings;
use crate::core::entity::{EntityExample, ExampleEntity, InvalidExample};
use crate::core::types::TraceToken;
use crate::matching::registry::{AlgorithmInfo, AlgorithmRegistry, UnknownAlgorithm};
use crate::matching::response::{BatchAssembler, BatchResponse, QueryResponse};
use crate::matching::scoring::score_results;
use crate::search::backend::{BackendError, SearchResult};
use crate::search::executor::SearchExecutor;
use crate::search::query::{build_entity_query, SearchRequest};

/// Request-level failures. Each is raised before any query is dispatched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Too many queries in one batch ({size}, max. {max})")]
    BatchTooLarge { size: usize, max: usize },

    #[error("No queries provided")]
    EmptyBatch,

    #[error("limit {limit} exceeds the maximum of {max}")]
    LimitTooLarge { limit: usize, max: usize },

    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),
}

/// Caller-supplied parameters of a batch; unset values use the settings
#[derive(Debug, Clone, Default)]
pub struct MatchParams {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub cutoff: Option<f64>,
    pub algorithm: Option<String>,
}

/// Runs batches of example entities against the search backend
#[derive(Clone)]
pub struct MatchOrchestrator {
    executor: SearchExecutor,
    registry: Arc<AlgorithmRegistry>,
    settings: Arc<Settings>,
}

impl MatchOrchestrator {
    pub fn new(
        executor: SearchExecutor,
        registry: Arc<AlgorithmRegistry>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            executor,
            registry,
            settings,
        }
    }

    /// Candidates requested from the backend for a result limit
    #[must_use]
    pub fn candidate_limit(&self, limit: usize) -> usize {
        limit
            .saturating_mul(self.settings.candidate_factor)
            .min(self.settings.max_page)
    }

    /// Match every named example in `queries` within the datasets in `scope`.
    ///
    /// Dropping the returned future aborts all backend calls still in flight.
    ///
    /// # Errors
    ///
    /// Returns `MatchError` if the batch is empty or too large, the limit is
    /// above the maximum, or the algorithm is unknown. Per-entry failures are
    /// reported inside the `BatchResponse`.
    pub async fn match_batch(
        &self,
        scope: &[String],
        queries: BTreeMap<String, EntityExample>,
        params: &MatchParams,
        trace: &TraceToken,
    ) -> Result<BatchResponse, MatchError> {
        let entries = queries
            .into_iter()
            .map(|(name, example)| (name, Ok(example)))
            .collect();
        self.run_batch(scope, entries, params, trace).await
    }

    /// Match a batch whose entries are still raw JSON, as received over the
    /// API. An entry that is not a well-formed example fails on its own.
    ///
    /// # Errors
    ///
    /// Same as [`match_batch`](Self::match_batch).
    pub async fn match_json_batch(
        &self,
        scope: &[String],
        queries: BTreeMap<String, serde_json::Value>,
        params: &MatchParams,
        trace: &TraceToken,
    ) -> Result<BatchResponse, MatchError> {
        let entries = queries
            .into_iter()
            .map(|(name, value)| (name, EntityExample::from_value(value)))
            .collect();
        self.run_batch(scope, entries, params, trace).await
    }

    async fn run_batch(
        &self,
        scope: &[String],
        queries: BTreeMap<String, Result<EntityExample, InvalidExample>>,
        params: &MatchParams,
        trace: &TraceToken,
    ) -> Result<BatchResponse, MatchError> {
        if queries.is_empty() {
            return Err(MatchError::EmptyBatch);
        }
        if queries.len() > self.settings.max_batch {
            return Err(MatchError::BatchTooLarge {
                size: queries.len(),
                max: self.settings.max_batch,
            });
        }
        let limit = params.limit.unwrap_or(self.settings.match_page);
        if limit > self.settings.max_matches {
            return Err(MatchError::LimitTooLarge {
                limit,
                max: self.settings.max_matches,
            });
        }
        let algorithm = self
            .registry
            .resolve_or_default(params.algorithm.as_deref())?;
        let threshold = params.threshold.unwrap_or(self.settings.score_threshold);
        let cutoff = params.cutoff.unwrap_or(self.settings.score_cutoff);
        let candidates = self.candidate_limit(limit);

        let matcher = AlgorithmInfo::from_algorithm(algorithm.as_ref());
        let mut assembler = BatchAssembler::new(matcher, limit);
        let mut pending: BTreeMap<String, ExampleEntity> = BTreeMap::new();
        let mut tasks: JoinSet<(String, Result<SearchResult, BackendError>)> = JoinSet::new();

        for (name, example) in queries {
            let built = example.and_then(|example| {
                let entity = ExampleEntity::from_example(&example)?;
                let query = build_entity_query(scope, &entity)?;
                Ok((entity, query))
            });
            let (entity, query) = match built {
                Ok(built) => built,
                Err(err) => {
                    tracing::info!(trace = %trace, name = %name, "Invalid example: {err}");
                    assembler.record(name, QueryResponse::error(400, err.to_string()));
                    continue;
                }
            };

            let request = SearchRequest::new(query, candidates);
            let executor = self.executor.clone();
            let task_trace = trace.clone();
            let task_name = name.clone();
            tasks.spawn(async move {
                let outcome = executor.execute(&request, &task_trace).await;
                (task_name, outcome)
            });
            pending.insert(name, entity);
        }

        tracing::debug!(trace = %trace, dispatched = tasks.len(), candidates, "Batch dispatched");

        while let Some(joined) = tasks.join_next().await {
            let (name, outcome) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tracing::warn!(trace = %trace, "Match task failed: {err}");
                    continue;
                }
            };
            let Some(entity) = pending.remove(&name) else {
                continue;
            };

            let response = match outcome {
                Ok(result) => {
                    let scored = score_results(
                        algorithm.as_ref(),
                        &entity,
                        &result.hits,
                        threshold,
                        cutoff,
                        limit,
                    );
                    tracing::info!(
                        action = "match",
                        trace = %trace,
                        name = %name,
                        schema = entity.schema.name,
                        caption = %entity.caption(),
                        considered = scored.considered,
                        results = scored.results.len(),
                        "Match"
                    );
                    QueryResponse::matches(scored.results, result.total, entity)
                }
                Err(err) => QueryResponse::error(err.status, err.message),
            };
            assembler.record(name, response);
        }

        // Tasks that panicked never reported back
        for name in pending.into_keys() {
            assembler.record(name, QueryResponse::error(500, "Query failed"));
        }

        Ok(assembler.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::EntityRecord;
    use crate::search::memory::MemoryBackend;
    use std::time::Duration;

    fn orchestrator(settings: Settings) -> MatchOrchestrator {
        let backend = MemoryBackend::new(vec![EntityRecord::new("NK-1", "Person")
            .with_property("name", &["John Doe"])
            .with_datasets(&["us_ofac_sdn"])]);
        MatchOrchestrator::new(
            SearchExecutor::new(Arc::new(backend), Duration::from_secs(5)),
            Arc::new(AlgorithmRegistry::builtin()),
            Arc::new(settings),
        )
    }

    fn scope() -> Vec<String> {
        vec!["us_ofac_sdn".to_string()]
    }

    #[test]
    fn test_candidate_limit() {
        let orchestrator = orchestrator(Settings::default());
        assert_eq!(orchestrator.candidate_limit(5), 50);
        assert_eq!(orchestrator.candidate_limit(100), 500);
    }

    #[tokio::test]
    async fn test_invalid_entry_isolated() {
        let queries = BTreeMap::from([
            (
                "good".to_string(),
                EntityExample::new("Person").with("name", &["John Doe"]),
            ),
            ("bad".to_string(), EntityExample::new("Spaceship")),
        ]);
        let batch = orchestrator(Settings::default())
            .match_batch(&scope(), queries, &MatchParams::default(), &TraceToken::generate())
            .await
            .unwrap();

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.responses["bad"].status(), 400);
        let good = batch.responses["good"].results();
        assert_eq!(good[0].entity.id, "NK-1");
        assert!(good[0].is_match);
    }

    #[tokio::test]
    async fn test_malformed_json_entries_isolated() {
        let queries = BTreeMap::from([
            (
                "good".to_string(),
                serde_json::json!({"schema": "Person", "properties": {"name": ["John Doe"]}}),
            ),
            (
                "no_schema".to_string(),
                serde_json::json!({"properties": {"name": ["Jane"]}}),
            ),
            ("null_entry".to_string(), serde_json::Value::Null),
        ]);
        let batch = orchestrator(Settings::default())
            .match_json_batch(&scope(), queries, &MatchParams::default(), &TraceToken::generate())
            .await
            .unwrap();

        assert_eq!(batch.batch_size(), 3);
        assert_eq!(batch.responses["no_schema"].status(), 400);
        assert_eq!(batch.responses["null_entry"].status(), 400);
        assert_eq!(batch.responses["good"].results()[0].entity.id, "NK-1");
    }

    #[tokio::test]
    async fn test_limit_above_max() {
        let queries = BTreeMap::from([(
            "a".to_string(),
            EntityExample::new("Person").with("name", &["John Doe"]),
        )]);
        let params = MatchParams {
            limit: Some(501),
            ..MatchParams::default()
        };
        let err = orchestrator(Settings::default())
            .match_batch(&scope(), queries, &params, &TraceToken::generate())
            .await
            .unwrap_err();
        assert_eq!(err, MatchError::LimitTooLarge { limit: 501, max: 500 });
    }
}
