//! Batch matching behaviour against scripted backends

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use entity_matcher::matching::MatchError;
use entity_matcher::search::backend::{BackendError, SearchBackend, SearchResult};
use entity_matcher::search::memory::MemoryBackend;
use entity_matcher::search::query::{SearchRequest, Signal};
use entity_matcher::{
    AlgorithmRegistry, DatasetCatalog, EntityExample, EntityRecord, MatchOrchestrator,
    MatchParams, SearchExecutor, Settings, Total, TraceToken,
};

/// Answers by the first name in the query: names containing "slow" stall,
/// "fail" is rate limited, anything else returns one exact hit.
struct ScriptedBackend {
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedBackend {
    fn new(delay: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }
}

fn first_name(request: &SearchRequest) -> String {
    request
        .query
        .should
        .iter()
        .find_map(|signal| match signal {
            Signal::Text { text, .. } => Some(text.clone()),
            Signal::Term { .. } => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(
        &self,
        request: &SearchRequest,
        _trace: &TraceToken,
    ) -> Result<SearchResult, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = first_name(request);
        if name.contains("slow") {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if name.contains("fail") {
            return Err(BackendError::new(429, "Too many requests"));
        }
        Ok(SearchResult {
            hits: vec![EntityRecord::new(format!("id-{name}"), "Person")
                .with_property("name", &[name.as_str()])],
            total: Total::exact(1),
            facets: None,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn orchestrator(
    backend: Arc<dyn SearchBackend>,
    timeout: Duration,
    settings: Settings,
) -> MatchOrchestrator {
    MatchOrchestrator::new(
        SearchExecutor::new(backend, timeout),
        Arc::new(AlgorithmRegistry::builtin()),
        Arc::new(settings),
    )
}

fn person(name: &str) -> EntityExample {
    EntityExample::new("Person").with("name", &[name])
}

fn batch(names: &[&str]) -> BTreeMap<String, EntityExample> {
    names
        .iter()
        .map(|n| ((*n).to_string(), person(&format!("{n} person"))))
        .collect()
}

fn scope() -> Vec<String> {
    let catalog = DatasetCatalog::load_embedded().unwrap();
    catalog.scope(catalog.resolve("default").unwrap())
}

// ============================================================================
// Batch envelope
// ============================================================================

#[tokio::test]
async fn test_response_keys_match_request() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let orchestrator = orchestrator(backend, Duration::from_secs(5), Settings::default());

    for size in 1..=5 {
        let names: Vec<String> = (0..size).map(|i| format!("q{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let response = orchestrator
            .match_batch(&scope(), batch(&refs), &MatchParams::default(), &TraceToken::generate())
            .await
            .unwrap();

        let keys: Vec<&String> = response.responses.keys().collect();
        let mut expected: Vec<&String> = names.iter().collect();
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(response.batch_size(), size);
        assert_eq!(response.limit, 5);
    }
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let calls = Arc::clone(&backend.calls);
    let err = orchestrator(backend, Duration::from_secs(5), Settings::default())
        .match_batch(&scope(), BTreeMap::new(), &MatchParams::default(), &TraceToken::generate())
        .await
        .unwrap_err();

    assert_eq!(err, MatchError::EmptyBatch);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_too_large_makes_no_calls() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let calls = Arc::clone(&backend.calls);
    let settings = Settings {
        max_batch: 3,
        ..Settings::default()
    };
    let err = orchestrator(backend, Duration::from_secs(5), settings)
        .match_batch(
            &scope(),
            batch(&["a", "b", "c", "d"]),
            &MatchParams::default(),
            &TraceToken::generate(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, MatchError::BatchTooLarge { size: 4, max: 3 });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Algorithm selection
// ============================================================================

#[tokio::test]
async fn test_unknown_algorithm_makes_no_calls() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let calls = Arc::clone(&backend.calls);
    let params = MatchParams {
        algorithm: Some("regression-v9".to_string()),
        ..MatchParams::default()
    };
    let err = orchestrator(backend, Duration::from_secs(5), Settings::default())
        .match_batch(&scope(), batch(&["a", "b"]), &params, &TraceToken::generate())
        .await
        .unwrap_err();

    assert!(matches!(err, MatchError::UnknownAlgorithm(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_best_alias_selects_best_algorithm() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let orchestrator = orchestrator(backend, Duration::from_secs(5), Settings::default());

    for alias in ["best", "BEST", " Best "] {
        let params = MatchParams {
            algorithm: Some(alias.to_string()),
            ..MatchParams::default()
        };
        let response = orchestrator
            .match_batch(&scope(), batch(&["a"]), &params, &TraceToken::generate())
            .await
            .unwrap();
        assert_eq!(response.matcher.name, "logic-v1");
    }
}

// ============================================================================
// Per-entry isolation
// ============================================================================

#[tokio::test]
async fn test_timeout_isolated_to_one_entry() {
    let backend = Arc::new(ScriptedBackend::new(Duration::from_secs(10)));
    let response = orchestrator(backend, Duration::from_millis(100), Settings::default())
        .match_batch(
            &scope(),
            batch(&["fast1", "slow", "fast2"]),
            &MatchParams::default(),
            &TraceToken::generate(),
        )
        .await
        .unwrap();

    assert_eq!(response.batch_size(), 3);
    assert_eq!(response.responses["fast1"].status(), 200);
    assert_eq!(response.responses["fast2"].status(), 200);
    assert_eq!(response.responses["slow"].status(), 504);
    assert!(response.responses["slow"].is_error());
}

#[tokio::test]
async fn test_backend_error_passed_through() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let response = orchestrator(backend, Duration::from_secs(5), Settings::default())
        .match_batch(
            &scope(),
            batch(&["ok", "fail"]),
            &MatchParams::default(),
            &TraceToken::generate(),
        )
        .await
        .unwrap();

    let json = serde_json::to_value(&response.responses["fail"]).unwrap();
    assert_eq!(json["status"], 429);
    assert_eq!(json["detail"], "Too many requests");
    assert_eq!(response.responses["ok"].results().len(), 1);
}

#[tokio::test]
async fn test_invalid_entry_not_dispatched() {
    let backend = Arc::new(ScriptedBackend::new(Duration::ZERO));
    let calls = Arc::clone(&backend.calls);
    let mut queries = batch(&["good"]);
    queries.insert("thing".to_string(), EntityExample::new("Thing"));
    queries.insert(
        "bad-date".to_string(),
        EntityExample::new("Person").with("birthDate", &["yesterday"]),
    );

    let response = orchestrator(backend, Duration::from_secs(5), Settings::default())
        .match_batch(&scope(), queries, &MatchParams::default(), &TraceToken::generate())
        .await
        .unwrap();

    assert_eq!(response.responses["thing"].status(), 400);
    assert_eq!(response.responses["bad-date"].status(), 400);
    assert_eq!(response.responses["good"].status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropping_batch_aborts_pending_calls() {
    let backend = Arc::new(ScriptedBackend::new(Duration::from_millis(300)));
    let calls = Arc::clone(&backend.calls);
    let completed = Arc::clone(&backend.completed);
    let orchestrator = orchestrator(backend, Duration::from_secs(10), Settings::default());

    let queries = batch(&["slow1", "slow2", "slow3"]);
    let scope = scope();
    let params = MatchParams::default();
    let trace = TraceToken::generate();
    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        orchestrator.match_batch(&scope, queries, &params, &trace),
    )
    .await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Scoring
// ============================================================================

fn screening_index() -> MemoryBackend {
    MemoryBackend::new(vec![
        EntityRecord::new("NK-john", "Person")
            .with_property("name", &["John Doe"])
            .with_property("birthDate", &["1975-04-21"])
            .with_datasets(&["us_ofac_sdn"]),
        EntityRecord::new("NK-jon", "Person")
            .with_property("name", &["Jon Doe"])
            .with_property("birthDate", &["1975"])
            .with_datasets(&["eu_fsf"]),
        EntityRecord::new("NK-jane", "Person")
            .with_property("name", &["Jane Doe"])
            .with_property("birthDate", &["1980-02-02"])
            .with_datasets(&["wd_peps"]),
        EntityRecord::new("NK-acme", "Company")
            .with_property("name", &["Acme Ltd"])
            .with_datasets(&["gb_hmt_sanctions"]),
        EntityRecord::new("NK-acme-h", "Company")
            .with_property("name", &["Acme Holdings"])
            .with_datasets(&["gb_hmt_sanctions"]),
        EntityRecord::new("NK-other", "Company")
            .with_property("name", &["Doe Industries"])
            .with_datasets(&["us_ofac_sdn"]),
    ])
}

#[tokio::test]
async fn test_end_to_end_person_and_company() {
    let orchestrator = orchestrator(
        Arc::new(screening_index()),
        Duration::from_secs(5),
        Settings::default(),
    );
    let queries = BTreeMap::from([
        (
            "a".to_string(),
            EntityExample::new("Person")
                .with("name", &["John Doe"])
                .with("birthDate", &["1975-04-21"]),
        ),
        (
            "b".to_string(),
            EntityExample::new("Company").with("name", &["Acme Ltd"]),
        ),
    ]);
    let params = MatchParams {
        limit: Some(5),
        threshold: Some(0.7),
        cutoff: Some(0.5),
        algorithm: None,
    };

    let response = orchestrator
        .match_batch(&scope(), queries, &params, &TraceToken::generate())
        .await
        .unwrap();

    let keys: Vec<&str> = response.responses.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(response.limit, 5);

    for query in response.responses.values() {
        let results = query.results();
        assert!(results.len() <= 5);
        for entry in results {
            assert!(entry.score >= 0.5);
            assert_eq!(entry.is_match, entry.score >= 0.7);
        }
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    let a = response.responses["a"].results();
    assert_eq!(a[0].entity.id, "NK-john");
    assert!(a[0].is_match);
    assert!(a.iter().all(|e| e.entity.schema == "Person"));

    let b = response.responses["b"].results();
    assert_eq!(b[0].entity.id, "NK-acme");
    assert!(b[0].is_match);
}

#[tokio::test]
async fn test_limit_caps_results() {
    let orchestrator = orchestrator(
        Arc::new(screening_index()),
        Duration::from_secs(5),
        Settings::default(),
    );
    let params = MatchParams {
        limit: Some(1),
        cutoff: Some(0.0),
        ..MatchParams::default()
    };
    let queries = BTreeMap::from([("a".to_string(), person("Doe"))]);
    let response = orchestrator
        .match_batch(&scope(), queries, &params, &TraceToken::generate())
        .await
        .unwrap();

    assert_eq!(response.limit, 1);
    assert_eq!(response.responses["a"].results().len(), 1);
}
