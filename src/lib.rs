//! # entity-matcher
//!
//! A library and API for finding the records in an entity index that describe
//! the same person, company or vessel as a partial example.
//!
//! Screening a customer against sanctions or PEP lists starts from incomplete
//! data: a name, maybe a birth date and a nationality. `entity-matcher` turns such
//! examples into search queries, runs a batch of them concurrently against a
//! search backend, and ranks each query's candidates with a pluggable scoring
//! algorithm.
//!
//! ## Features
//!
//! - **Batch matching**: Many named examples per request, each isolated from
//!   the failures of the others
//! - **Pluggable scoring**: Named algorithms with a per-feature breakdown
//! - **Dataset scoping**: Collections of datasets resolved from a catalog
//! - **Free-text search**: Faceted by country, topic and data source
//! - **Redirects**: Ids merged into another record resolve to the canonical one
//! - **Backends**: Elasticsearch over HTTP, or an in-memory index
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use entity_matcher::{
//!     AlgorithmRegistry, DatasetCatalog, EntityExample, MatchOrchestrator, MatchParams,
//!     SearchExecutor, Settings, TraceToken,
//! };
//! use entity_matcher::search::memory::MemoryBackend;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let catalog = DatasetCatalog::load_embedded()?;
//! let backend = MemoryBackend::load_from_file("entities.jsonl".as_ref())?;
//!
//! let orchestrator = MatchOrchestrator::new(
//!     SearchExecutor::new(Arc::new(backend), Duration::from_secs(10)),
//!     Arc::new(AlgorithmRegistry::builtin()),
//!     Arc::new(Settings::default()),
//! );
//!
//! let queries = BTreeMap::from([(
//!     "a".to_string(),
//!     EntityExample::new("Person")
//!         .with("name", &["John Doe"])
//!         .with("birthDate", &["1975-04-21"]),
//! )]);
//! let scope = catalog.scope(catalog.resolve("sanctions")?);
//! let batch = orchestrator
//!     .match_batch(&scope, queries, &MatchParams::default(), &TraceToken::generate())
//!     .await?;
//!
//! for entry in batch.responses["a"].results() {
//!     println!("{}: {:.1}%", entry.entity.caption, entry.score * 100.0);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Dataset catalog storage and scoping
//! - [`core`]: Schemata, example entities and records
//! - [`search`]: Query building, backends, search and entity fetch
//! - [`matching`]: Batch orchestration and scoring algorithms
//! - [`config`]: Service settings
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: HTTP API

pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod matching;
pub mod search;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use catalog::store::DatasetCatalog;
pub use config::Settings;
pub use core::dataset::Dataset;
pub use core::entity::{EntityExample, EntityRecord, ExampleEntity};
pub use core::types::*;
pub use matching::{AlgorithmRegistry, BatchResponse, MatchOrchestrator, MatchParams};
pub use search::executor::SearchExecutor;
