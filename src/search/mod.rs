//! Query construction and execution against a search backend.
//!
//! - [`query`]: Pure builders from example entities and search text to [`Query`](query::Query)
//! - [`backend`]: The [`SearchBackend`](backend::SearchBackend) trait and its result types
//! - [`elastic`]: Elasticsearch-compatible HTTP backend
//! - [`memory`]: In-process backend over a fixed set of records
//! - [`executor`]: Timeout-bounded, traced execution of requests
//! - [`fetch`]: Entity lookup by id with redirect resolution
//! - [`text`]: Free-text search with facets
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use entity_matcher::core::entity::{EntityExample, EntityRecord, ExampleEntity};
//! use entity_matcher::core::types::TraceToken;
//! use entity_matcher::search::executor::SearchExecutor;
//! use entity_matcher::search::memory::MemoryBackend;
//! use entity_matcher::search::query::{build_entity_query, SearchRequest};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let backend = MemoryBackend::new(vec![
//!     EntityRecord::new("NK-1", "Person").with_property("name", &["John Doe"]),
//! ]);
//! let executor = SearchExecutor::new(Arc::new(backend), Duration::from_secs(10));
//!
//! let example = ExampleEntity::from_example(
//!     &EntityExample::new("Person").with("name", &["John Doe"]),
//! ).unwrap();
//! let query = build_entity_query(&[], &example).unwrap();
//! let result = executor
//!     .execute(&SearchRequest::new(query, 10), &TraceToken::generate())
//!     .await
//!     .unwrap();
//! assert_eq!(result.hits[0].id, "NK-1");
//! # });
//! ```

pub mod backend;
pub mod elastic;
pub mod executor;
pub mod fetch;
pub mod memory;
pub mod query;
pub mod text;
