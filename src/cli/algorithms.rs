use clap::Args;

use crate::cli::OutputFormat;
use crate::matching::registry::AlgorithmListing;
use crate::matching::AlgorithmRegistry;

#[derive(Args)]
pub struct AlgorithmsArgs {
    /// Algorithm selected when none is requested
    #[arg(long, env = "ENTITY_MATCHER_ALGORITHM", default_value = "logic-v1")]
    pub algorithm: String,

    /// Algorithm selected by the name `best`
    #[arg(long, env = "ENTITY_MATCHER_BEST_ALGORITHM", default_value = "logic-v1")]
    pub best_algorithm: String,
}

/// Execute algorithms subcommand
///
/// # Errors
///
/// Returns an error if the default or best algorithm is unknown.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: AlgorithmsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let registry =
        AlgorithmRegistry::builtin().with_aliases(&args.algorithm, &args.best_algorithm)?;
    let listing = registry.listing();

    match format {
        OutputFormat::Text => print_text_listing(&listing, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        OutputFormat::Tsv => print_tsv_listing(&listing),
    }

    Ok(())
}

fn print_text_listing(listing: &AlgorithmListing, verbose: bool) {
    println!("Scoring Algorithms ({} available)\n", listing.algorithms.len());
    for algorithm in &listing.algorithms {
        let mut tags = Vec::new();
        if algorithm.name == listing.default {
            tags.push("default");
        }
        if algorithm.name == listing.best {
            tags.push("best");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" ({})", tags.join(", "))
        };
        println!("{}{tags}", algorithm.name);
        println!("  {}", algorithm.description);

        if verbose {
            for feature in &algorithm.features {
                println!(
                    "    {:<20} {:>6.2}  {}",
                    feature.name, feature.weight, feature.description
                );
            }
        }
        println!();
    }
}

fn print_tsv_listing(listing: &AlgorithmListing) {
    println!("algorithm\tfeature\tweight");
    for algorithm in &listing.algorithms {
        for feature in &algorithm.features {
            println!("{}\t{}\t{}", algorithm.name, feature.name, feature.weight);
        }
    }
}
