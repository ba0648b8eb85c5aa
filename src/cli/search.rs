use std::sync::Arc;

use clap::Args;

use crate::cli::{truncate, BackendArgs, OutputFormat};
use crate::config::Settings;
use crate::core::types::TraceToken;
use crate::search::executor::SearchExecutor;
use crate::search::query::SearchFilters;
use crate::search::text::{search_entities, SearchParams, SearchResponse};

#[derive(Args)]
pub struct SearchArgs {
    /// Search text; omit to browse the dataset
    #[arg(default_value = "")]
    pub query: String,

    /// Dataset to search within
    #[arg(short, long, default_value = "default")]
    pub dataset: String,

    /// Schema to search (e.g., "Person")
    #[arg(long)]
    pub schema: Option<String>,

    /// Country code filter, repeatable
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Topic filter (e.g., "sanction"), repeatable
    #[arg(long = "topic")]
    pub topics: Vec<String>,

    /// Only targeted entities
    #[arg(long)]
    pub target: bool,

    /// Allow spelling variations
    #[arg(long)]
    pub fuzzy: bool,

    /// Sort by field[:asc|desc], repeatable
    #[arg(long)]
    pub sort: Vec<String>,

    /// Number of results
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Results to skip
    #[arg(long)]
    pub offset: Option<usize>,

    /// Backend request timeout in seconds
    #[arg(long, env = "ENTITY_MATCHER_TIMEOUT", default_value = "10")]
    pub timeout: u64,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Execute search subcommand
///
/// # Errors
///
/// Returns an error if the backend cannot be set up or the search fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: SearchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let settings = Settings {
        request_timeout: std::time::Duration::from_secs(args.timeout),
        ..Settings::default()
    };
    let catalog = args.backend.load_catalog()?;
    let backend = args.backend.build(settings.request_timeout)?;
    let dataset = catalog.resolve(&args.dataset)?;
    let executor = SearchExecutor::new(Arc::clone(&backend), settings.request_timeout);

    let params = SearchParams {
        q: args.query.clone(),
        schema: args.schema.clone(),
        filters: SearchFilters {
            countries: args.countries.clone(),
            topics: args.topics.clone(),
            datasets: Vec::new(),
            target: args.target.then_some(true),
        },
        limit: args.limit,
        offset: args.offset,
        fuzzy: args.fuzzy,
        sort: args.sort.clone(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(search_entities(
        &executor,
        &catalog,
        &settings,
        dataset,
        &params,
        &TraceToken::generate(),
    ))?;

    if verbose {
        eprintln!(
            "Searched {} with the {} backend (timeout {}s)",
            dataset.name,
            backend.name(),
            settings.request_timeout.as_secs()
        );
    }

    match format {
        OutputFormat::Text => print_text_results(&response, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Tsv => print_tsv_results(&response),
    }

    Ok(())
}

fn print_text_results(response: &SearchResponse, verbose: bool) {
    let relation = if response.total.is_exact() { "" } else { "at least " };
    println!(
        "Found {relation}{} entities (showing {}-{})\n",
        response.total.value,
        response.offset + usize::from(!response.results.is_empty()),
        response.offset + response.results.len()
    );

    for entity in &response.results {
        println!(
            "  {:<24} {:<14} {}",
            truncate(&entity.id, 24),
            entity.schema,
            entity.caption
        );
    }

    if verbose {
        for facet in response.facets.values() {
            println!("\n{}:", facet.label);
            for item in &facet.values {
                println!("  {:>6}  {}", item.count, item.label);
            }
        }
    }
}

fn print_tsv_results(response: &SearchResponse) {
    println!("id\tschema\tcaption\tdatasets\ttarget");
    for entity in &response.results {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            entity.id,
            entity.schema,
            entity.caption,
            entity.datasets.join(","),
            entity.target
        );
    }
}
