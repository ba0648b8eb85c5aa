//! HTTP API for batch matching, search and entity lookup.
//!
//! Built with Axum. Every request gets a fresh trace token, echoed in the
//! `x-trace-id` response header and passed to the search backend.
//!
//! ## Starting the Server
//!
//! ```text
//! # Serve an in-memory index on the default port 8080
//! entity-matcher serve --entities entities.jsonl
//!
//! # Against Elasticsearch, bound to all interfaces
//! entity-matcher serve --es-url http://localhost:9200 --es-index entities --address 0.0.0.0
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /match/{dataset}` - Match a batch of example entities
//! - `GET /search/{dataset}` - Free-text search with facets
//! - `GET /entities/{id}` - Fetch an entity; merged ids redirect with 307
//! - `GET /algorithms` - Available scoring algorithms
//! - `GET /catalog` - The dataset catalog
//! - `GET /healthz` - Liveness

pub mod error;
pub mod server;
