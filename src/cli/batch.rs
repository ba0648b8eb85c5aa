use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use crate::cli::{truncate, BackendArgs, OutputFormat};
use crate::config::{ServiceArgs, Settings};
use crate::core::types::TraceToken;
use crate::matching::{
    AlgorithmRegistry, BatchResponse, MatchOrchestrator, MatchParams, QueryResponse,
};
use crate::search::executor::SearchExecutor;

#[derive(Args)]
pub struct MatchArgs {
    /// JSON file mapping query names to example entities, optionally
    /// wrapped in {"queries": ...}. Use '-' for stdin
    #[arg(required = true)]
    pub input: PathBuf,

    /// Dataset to match within
    #[arg(short, long, default_value = "default")]
    pub dataset: String,

    /// Number of matches per query
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub service: ServiceArgs,
}

/// Read a batch from JSON, accepting both the API body and a bare map
fn parse_queries(content: &str) -> anyhow::Result<BTreeMap<String, serde_json::Value>> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(queries) = value.get_mut("queries") {
        value = queries.take();
    }
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn read_input(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))
    }
}

/// Execute match subcommand
///
/// # Errors
///
/// Returns an error if the input cannot be read, the backend cannot be
/// set up, or the batch is rejected as a whole.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: MatchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let queries = parse_queries(&read_input(&args.input)?)?;
    let settings = Settings::from(&args.service);
    let catalog = args.backend.load_catalog()?;
    let backend = args.backend.build(settings.request_timeout)?;
    let dataset = catalog.resolve(&args.dataset)?;
    let scope = catalog.scope(dataset);

    if verbose {
        eprintln!(
            "Matching {} queries within {} ({} datasets) using {}",
            queries.len(),
            dataset.name,
            scope.len(),
            backend.name()
        );
    }

    let registry = AlgorithmRegistry::builtin()
        .with_aliases(&settings.default_algorithm, &settings.best_algorithm)?;
    let executor = SearchExecutor::new(backend, settings.request_timeout);
    let orchestrator = MatchOrchestrator::new(executor, Arc::new(registry), Arc::new(settings));
    let params = MatchParams {
        limit: args.limit,
        ..MatchParams::default()
    };

    let rt = tokio::runtime::Runtime::new()?;
    let batch = rt.block_on(orchestrator.match_json_batch(
        &scope,
        queries,
        &params,
        &TraceToken::generate(),
    ))?;

    match format {
        OutputFormat::Text => print_text_results(&batch, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&batch)?),
        OutputFormat::Tsv => print_tsv_results(&batch),
    }

    Ok(())
}

fn print_text_results(batch: &BatchResponse, verbose: bool) {
    println!(
        "Matched {} queries with {} (limit {})\n",
        batch.batch_size(),
        batch.matcher.name,
        batch.limit
    );

    for (name, response) in &batch.responses {
        match response {
            QueryResponse::PartialError { status, detail } => {
                println!("[{name}] Error {status}: {detail}\n");
            }
            QueryResponse::EntityMatches {
                results,
                total,
                query,
                ..
            } => {
                println!(
                    "[{name}] {} '{}': {} results ({} candidates)",
                    query.schema.name,
                    query.caption(),
                    results.len(),
                    total.value
                );
                for entry in results {
                    let marker = if entry.is_match { "*" } else { " " };
                    println!(
                        "  {marker} {:>5.1}%  {:<14} {:<24} {}",
                        entry.score * 100.0,
                        entry.entity.schema,
                        truncate(&entry.entity.id, 24),
                        entry.entity.caption
                    );
                    if verbose {
                        for (feature, value) in &entry.features {
                            println!("             {feature}: {value:.3}");
                        }
                    }
                }
                println!();
            }
        }
    }
}

fn print_tsv_results(batch: &BatchResponse) {
    println!("query\tid\tschema\tcaption\tscore\tmatch");
    for (name, response) in &batch.responses {
        for entry in response.results() {
            println!(
                "{}\t{}\t{}\t{}\t{:.4}\t{}",
                name,
                entry.entity.id,
                entry.entity.schema,
                entry.entity.caption,
                entry.score,
                entry.is_match
            );
        }
    }
}
