//! Batch matching of example entities and candidate scoring.
//!
//! This module provides the matching pipeline:
//!
//! - [`MatchOrchestrator`]: Runs a batch of named examples concurrently
//! - [`AlgorithmRegistry`]: Named scoring algorithms with a `best` alias
//! - [`score_results`]: Ranks one query's candidates under a threshold and cutoff
//! - [`BatchResponse`]: Per-name outcomes, each a set of matches or an error
//!
//! ## Scoring
//!
//! Each algorithm compares the example with one candidate and returns a score
//! in `[0, 1]` with a breakdown by feature. The shipped algorithms are:
//!
//! - **name-based**: Jaro-Winkler similarity of normalized names
//! - **name-qualified**: Name similarity with country and birth year penalties
//! - **logic-v1**: Strongest of name and identifier evidence, minus penalties
//!
//! Candidates scoring below the cutoff are dropped; those at or above the
//! threshold are flagged as matches.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use entity_matcher::config::Settings;
//! use entity_matcher::core::entity::{EntityExample, EntityRecord};
//! use entity_matcher::core::types::TraceToken;
//! use entity_matcher::matching::{AlgorithmRegistry, MatchOrchestrator, MatchParams};
//! use entity_matcher::search::executor::SearchExecutor;
//! use entity_matcher::search::memory::MemoryBackend;
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let backend = MemoryBackend::new(vec![
//!     EntityRecord::new("NK-1", "Person").with_property("name", &["John Doe"]),
//! ]);
//! let orchestrator = MatchOrchestrator::new(
//!     SearchExecutor::new(Arc::new(backend), Duration::from_secs(10)),
//!     Arc::new(AlgorithmRegistry::builtin()),
//!     Arc::new(Settings::default()),
//! );
//!
//! let queries = BTreeMap::from([(
//!     "a".to_string(),
//!     EntityExample::new("Person").with("name", &["John Doe"]),
//! )]);
//! let batch = orchestrator
//!     .match_batch(&[], queries, &MatchParams::default(), &TraceToken::generate())
//!     .await
//!     .unwrap();
//!
//! for entry in batch.responses["a"].results() {
//!     println!("{}: {:.2}", entry.entity.caption, entry.score);
//! }
//! # }
//! ```

pub mod algorithms;
pub mod orchestrator;
pub mod registry;
pub mod response;
pub mod scoring;

pub use orchestrator::{MatchError, MatchOrchestrator, MatchParams};
pub use registry::{AlgorithmHandle, AlgorithmRegistry, UnknownAlgorithm};
pub use response::{BatchResponse, QueryResponse};
pub use scoring::{score_results, MatchEntry};
