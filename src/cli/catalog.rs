use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::catalog::DatasetCatalog;
use crate::cli::{truncate, OutputFormat};

#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List all datasets in the catalog
    List {
        /// Path to custom catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Only list collections of other datasets
        #[arg(long)]
        collections: bool,
    },

    /// Show details of a specific dataset
    Show {
        /// Dataset name
        #[arg(required = true)]
        name: String,

        /// Path to custom catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Export the catalog to a file
    Export {
        /// Output file path
        #[arg(required = true)]
        output: PathBuf,

        /// Path to custom catalog file to export (defaults to embedded)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

/// Execute catalog subcommand
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the dataset does not
/// exist, or the export cannot be written.
pub fn run(args: CatalogArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        CatalogCommands::List {
            catalog,
            collections,
        } => run_list(catalog, collections, format, verbose),
        CatalogCommands::Show { name, catalog } => run_show(&name, catalog, format),
        CatalogCommands::Export { output, catalog } => run_export(output, catalog),
    }
}

fn load(catalog_path: Option<PathBuf>) -> anyhow::Result<DatasetCatalog> {
    let catalog = if let Some(path) = catalog_path {
        DatasetCatalog::load_from_file(&path)?
    } else {
        DatasetCatalog::load_embedded()?
    };
    Ok(catalog)
}

fn run_list(
    catalog_path: Option<PathBuf>,
    collections_only: bool,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let catalog = load(catalog_path)?;

    if verbose {
        eprintln!("Loaded catalog with {} datasets", catalog.len());
    }

    let filtered: Vec<_> = catalog
        .datasets
        .iter()
        .filter(|d| !collections_only || d.is_collection())
        .collect();

    match format {
        OutputFormat::Text => {
            let name_width = filtered
                .iter()
                .map(|d| d.name.len())
                .max()
                .unwrap_or(4)
                .max(4);
            let title_width = filtered
                .iter()
                .map(|d| d.title.len().min(40))
                .max()
                .unwrap_or(5)
                .max(5);

            println!("Dataset Catalog ({} datasets)\n", filtered.len());
            println!(
                "{:<name_w$} {:<title_w$} {:>8}",
                "Name",
                "Title",
                "Datasets",
                name_w = name_width,
                title_w = title_width
            );
            println!("{}", "-".repeat(name_width + title_width + 10));

            for d in &filtered {
                println!(
                    "{:<name_w$} {:<title_w$} {:>8}",
                    d.name,
                    truncate(&d.title, title_width),
                    catalog.scope(d).len(),
                    name_w = name_width,
                    title_w = title_width
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        OutputFormat::Tsv => {
            println!("name\ttitle\tpublisher\tchildren");
            for d in &filtered {
                println!(
                    "{}\t{}\t{}\t{}",
                    d.name,
                    d.title,
                    d.publisher.as_deref().unwrap_or(""),
                    d.children.join(",")
                );
            }
        }
    }

    Ok(())
}

fn run_show(
    name: &str,
    catalog_path: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let catalog = load(catalog_path)?;
    let dataset = catalog.resolve(name)?;
    let scope = catalog.scope(dataset);

    match format {
        OutputFormat::Text => {
            println!("Dataset: {}\n", dataset.title);
            println!("Name:      {}", dataset.name);
            if let Some(publisher) = &dataset.publisher {
                println!("Publisher: {publisher}");
            }
            if let Some(updated_at) = &dataset.updated_at {
                println!("Updated:   {updated_at}");
            }
            if let Some(summary) = &dataset.summary {
                println!("\n{summary}");
            }

            if dataset.is_collection() {
                println!("\nIncludes ({} datasets):", scope.len() - 1);
                for member in scope.iter().filter(|m| *m != &dataset.name) {
                    println!("  {:<24} {}", member, catalog.title(member));
                }
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "dataset": dataset,
                "scope": scope,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Tsv => {
            println!("dataset\tmember\ttitle");
            for member in &scope {
                println!("{}\t{}\t{}", dataset.name, member, catalog.title(member));
            }
        }
    }

    Ok(())
}

fn run_export(output: PathBuf, catalog_path: Option<PathBuf>) -> anyhow::Result<()> {
    let catalog = load(catalog_path)?;

    let json = catalog.to_json()?;
    std::fs::write(&output, json)?;

    println!("Exported {} datasets to {}", catalog.len(), output.display());

    Ok(())
}
