//! CLI binary for shellcraft.

use clap::{Parser, Subcommand};
use shellcraft::{Candidate, Category, IngestReport, Page, Record, Services, ShellcraftConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shellcraft: find, curate and store shell craft images.
#[derive(Parser)]
#[command(name = "shellcraft", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search every provider for a query.
    Search {
        query: String,
        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,
        /// Store the results locally.
        #[arg(long)]
        ingest: bool,
        /// Category to store into. Without it each result is classified.
        #[arg(long, requires = "ingest")]
        category: Option<String>,
    },

    /// Search and store images for one category.
    Category {
        name: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Clear the category before storing the new results.
        #[arg(long)]
        fresh: bool,
    },

    /// Find images like a local one (keyword approximation).
    Similar {
        image: PathBuf,
        /// Extra keywords blended into every query.
        #[arg(short, long, default_value = "")]
        keywords: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Store the results under `upload_search`.
        #[arg(long)]
        ingest: bool,
    },

    /// List stored records, newest first.
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Search stored records by title, description or category.
    Find { text: String },

    /// Record counts for the four fixed categories.
    Counts,

    /// Store summary.
    Stats,

    /// Delete one record and its image.
    Delete { id: String },

    /// Delete every record in a category.
    Clear { category: String },

    /// Remove image files no record references.
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shellcraft=info,shellcraft_search=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ShellcraftConfig::load(cli.config.as_deref())?;
    let services = Services::build(config)?;

    match cli.command {
        Command::Search {
            query,
            limit,
            ingest,
            category,
        } => run_search(&services, &query, limit, ingest, category).await,
        Command::Category { name, limit, fresh } => {
            run_category(&services, &name, limit, fresh).await
        }
        Command::Similar {
            image,
            keywords,
            limit,
            ingest,
        } => run_similar(&services, image, &keywords, limit, ingest).await,
        Command::List {
            category,
            limit,
            offset,
        } => {
            let page = Page::new(limit, offset);
            let records = match category {
                Some(name) => services.records.get_by_category(&Category::from(name), page)?,
                None => services.records.get_all(page)?,
            };
            print_records(&records);
            Ok(())
        }
        Command::Find { text } => {
            print_records(&services.records.search(&text)?);
            Ok(())
        }
        Command::Counts => {
            for (category, count) in services.records.category_counts()? {
                println!("{category:<16} {count}");
            }
            Ok(())
        }
        Command::Stats => {
            let stats = services.records.stats()?;
            println!("total records: {}", stats.total);
            for (category, count) in &stats.by_category {
                println!("  {category:<16} {count}");
            }
            for (platform, count) in &stats.by_platform {
                println!("  {platform:<16} {count}");
            }
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("saved between {oldest} and {newest}");
            }
            Ok(())
        }
        Command::Delete { id } => {
            if services.records.delete(&id)? {
                println!("Deleted {id}");
            } else {
                println!("No record with id {id}");
            }
            Ok(())
        }
        Command::Clear { category } => {
            let removed = services.records.clear_category(&Category::from(category.as_str()))?;
            println!("Cleared {removed} records from {category}");
            Ok(())
        }
        Command::Sweep => {
            let removed = services.records.sweep_orphans()?;
            println!("Removed {removed} orphaned files");
            Ok(())
        }
    }
}

async fn run_search(
    services: &Services,
    query: &str,
    limit: Option<usize>,
    ingest: bool,
    category: Option<String>,
) -> anyhow::Result<()> {
    let limit = limit.unwrap_or(services.config.search.max_results);
    let results = services.orchestrator.search_all(query, limit).await?;
    print_candidates(&results);

    if ingest {
        let report = match category {
            Some(name) => {
                services
                    .ingestion
                    .ingest(&results, &Category::from(name))
                    .await?
            }
            None => services.ingestion.ingest_classified(&results).await?,
        };
        print_report(&report);
    }
    Ok(())
}

async fn run_category(
    services: &Services,
    name: &str,
    limit: Option<usize>,
    fresh: bool,
) -> anyhow::Result<()> {
    let category = Category::from(name);
    let limit = limit.unwrap_or(services.config.search.max_results);
    let results = services
        .orchestrator
        .search_by_category(&category, limit)
        .await?;
    println!("Found {} results for {category}", results.len());

    if fresh {
        let removed = services.records.clear_category(&category)?;
        println!("Cleared {removed} previous records");
    }
    let report = services.ingestion.ingest(&results, &category).await?;
    print_report(&report);
    Ok(())
}

async fn run_similar(
    services: &Services,
    image: PathBuf,
    keywords: &str,
    limit: Option<usize>,
    ingest: bool,
) -> anyhow::Result<()> {
    if !image.is_file() {
        anyhow::bail!("image not found: {}", image.display());
    }
    let limit = limit.unwrap_or(services.config.search.max_results);
    let results = services
        .orchestrator
        .search_similar(&image, keywords, limit)
        .await?;
    print_candidates(&results);

    if ingest {
        let report = services
            .ingestion
            .ingest(&results, &Category::UploadSearch)
            .await?;
        print_report(&report);
    }
    Ok(())
}

fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("No results.");
        return;
    }
    for (i, c) in candidates.iter().enumerate() {
        println!("{:>3}. {} [{}] via {}", i + 1, c.title, c.platform, c.provider);
        println!("     image:  {}", c.image_url);
        println!("     source: {}", c.source_url);
    }
}

fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }
    for r in records {
        println!(
            "{}  {:<16} {} [{}]  {}",
            r.id,
            r.category,
            r.title,
            r.platform,
            r.local_asset.as_deref().unwrap_or("-")
        );
    }
}

fn print_report(report: &IngestReport) {
    if report.failed == 0 {
        println!(
            "Stored {} new images ({} already stored, {} skipped)",
            report.stored, report.refreshed, report.skipped
        );
    } else {
        println!(
            "Stored {} new images ({} already stored, {} skipped, {} failed downloads)",
            report.stored, report.refreshed, report.skipped, report.failed
        );
    }
}
