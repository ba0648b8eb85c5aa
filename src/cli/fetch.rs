use std::time::Duration;

use clap::Args;

use crate::cli::{BackendArgs, OutputFormat};
use crate::core::types::TraceToken;
use crate::search::executor::SearchExecutor;
use crate::search::fetch::{EntityResolver, EntityResponse, FetchOutcome, PropertyValue};

/// Most adjacent entities shown per direction
const MAX_ADJACENT: usize = 500;

#[derive(Args)]
pub struct FetchArgs {
    /// Entity id
    #[arg(required = true)]
    pub id: String,

    /// Do not inline adjacent entities
    #[arg(long)]
    pub flat: bool,

    /// Backend request timeout in seconds
    #[arg(long, env = "ENTITY_MATCHER_TIMEOUT", default_value = "10")]
    pub timeout: u64,

    #[command(flatten)]
    pub backend: BackendArgs,
}

/// Execute fetch subcommand. Merged ids are followed to the canonical
/// record once.
///
/// # Errors
///
/// Returns an error if the backend fails or the entity does not exist.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: FetchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let backend = args.backend.build(timeout)?;
    let resolver = EntityResolver::new(SearchExecutor::new(backend, timeout), MAX_ADJACENT);
    let trace = TraceToken::generate();
    let nested = !args.flat;

    let rt = tokio::runtime::Runtime::new()?;
    let mut outcome = rt.block_on(resolver.fetch_entity(&args.id, nested, &trace))?;
    if let FetchOutcome::Redirect(canonical) = outcome.clone() {
        if verbose {
            eprintln!("{} was merged into {canonical}", args.id);
        }
        outcome = rt.block_on(resolver.fetch_entity(&canonical, nested, &trace))?;
    }

    let entity = match outcome {
        FetchOutcome::Found(entity) => entity,
        FetchOutcome::Redirect(canonical) => {
            anyhow::bail!("Entity {} redirects more than once (to {canonical})", args.id)
        }
        FetchOutcome::NotFound => anyhow::bail!("Entity not found: {}", args.id),
    };

    match format {
        OutputFormat::Text => print_text_entity(&entity),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entity)?),
        OutputFormat::Tsv => print_tsv_entity(&entity),
    }

    Ok(())
}

fn value_label(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Text(text) => text.clone(),
        PropertyValue::Entity(entity) => {
            format!("{} [{}: {}]", entity.caption, entity.schema, entity.id)
        }
    }
}

fn print_text_entity(entity: &EntityResponse) {
    println!("{} ({})", entity.caption, entity.schema);
    println!("{}", "=".repeat(60));
    println!("ID:        {}", entity.id);
    println!("Datasets:  {}", entity.datasets.join(", "));
    println!("Target:    {}", if entity.target { "yes" } else { "no" });
    if !entity.referents.is_empty() {
        println!("Merged:    {}", entity.referents.join(", "));
    }
    if let Some(first_seen) = &entity.first_seen {
        println!("First seen: {first_seen}");
    }
    if let Some(last_seen) = &entity.last_seen {
        println!("Last seen:  {last_seen}");
    }

    println!();
    let width = entity.properties.keys().map(String::len).max().unwrap_or(0);
    for (property, values) in &entity.properties {
        for value in values {
            println!("  {property:<width$}  {}", value_label(value));
        }
    }
}

fn print_tsv_entity(entity: &EntityResponse) {
    println!("id\tproperty\tvalue");
    for (property, values) in &entity.properties {
        for value in values {
            println!("{}\t{}\t{}", entity.id, property, value_label(value));
        }
    }
}
