//! Command-line interface for entity-matcher.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **serve**: Start the HTTP API
//! - **match**: Match example entities from a JSON file
//! - **search**: Free-text search
//! - **fetch**: Fetch an entity by id
//! - **algorithms**: List the scoring algorithms
//! - **catalog**: List, show, or export datasets from the catalog
//!
//! ## Usage
//!
//! ```text
//! # Match a batch of examples against an in-memory index
//! entity-matcher match queries.json --entities entities.jsonl
//!
//! # Search Elasticsearch, JSON output for scripting
//! entity-matcher search "vladimir putin" --es-url http://localhost:9200 --format json
//!
//! # Start the API
//! entity-matcher serve --entities entities.jsonl --port 8080
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::catalog::DatasetCatalog;
use crate::config::ServiceArgs;
use crate::search::backend::SearchBackend;
use crate::search::elastic::ElasticBackend;
use crate::search::memory::MemoryBackend;

pub mod algorithms;
pub mod batch;
pub mod catalog;
pub mod fetch;
pub mod search;

#[derive(Parser)]
#[command(name = "entity-matcher")]
#[command(version)]
#[command(about = "Match, search and fetch entities from a screening index")]
#[command(
    long_about = "entity-matcher finds the records in an entity index that describe the same person, company or vessel as a partial example.\n\nIt provides:\n- Batch matching of example entities with pluggable scoring algorithms\n- Free-text search with facets\n- Entity lookup that follows merged ids to their canonical record"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match example entities from a JSON file
    Match(batch::MatchArgs),

    /// Search entities by text
    Search(search::SearchArgs),

    /// Fetch an entity by id
    Fetch(fetch::FetchArgs),

    /// List the available scoring algorithms
    Algorithms(algorithms::AlgorithmsArgs),

    /// Manage the dataset catalog
    Catalog(catalog::CatalogArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub service: ServiceArgs,
}

/// Selection of the search backend and dataset catalog
#[derive(clap::Args, Debug, Clone)]
pub struct BackendArgs {
    /// JSON lines file of entities to search in memory instead of Elasticsearch
    #[arg(long, env = "ENTITY_MATCHER_ENTITIES")]
    pub entities: Option<PathBuf>,

    /// Elasticsearch base URL
    #[arg(long, env = "ENTITY_MATCHER_ES_URL", default_value = "http://localhost:9200")]
    pub es_url: String,

    /// Elasticsearch index holding the entities
    #[arg(long, env = "ENTITY_MATCHER_ES_INDEX", default_value = "entities")]
    pub es_index: String,

    /// Path to custom dataset catalog file
    #[arg(long, env = "ENTITY_MATCHER_CATALOG")]
    pub catalog: Option<PathBuf>,
}

impl BackendArgs {
    /// Build the selected backend; an entities file takes precedence
    ///
    /// # Errors
    ///
    /// Returns an error if the entities file cannot be loaded or the HTTP
    /// client cannot be created.
    pub fn build(&self, timeout: Duration) -> anyhow::Result<Arc<dyn SearchBackend>> {
        if let Some(path) = &self.entities {
            let backend = MemoryBackend::load_from_file(path)
                .with_context(|| format!("Failed to load entities from {}", path.display()))?;
            return Ok(Arc::new(backend));
        }
        let backend = ElasticBackend::new(&self.es_url, &self.es_index, timeout)?;
        Ok(Arc::new(backend))
    }

    /// Load the custom catalog if given, else the embedded one
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or is invalid.
    pub fn load_catalog(&self) -> anyhow::Result<DatasetCatalog> {
        let catalog = if let Some(path) = &self.catalog {
            DatasetCatalog::load_from_file(path)
                .with_context(|| format!("Failed to load catalog from {}", path.display()))?
        } else {
            DatasetCatalog::load_embedded()?
        };
        Ok(catalog)
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Truncate a string for column output
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
