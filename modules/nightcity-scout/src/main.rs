use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nightcity_archive::{ChromeEnricher, ImageEnricher, NoopEnricher, RequestCache, WikiClient, WikiFetcher};
use nightcity_catalog::{Aggregator, CatalogEditor};
use nightcity_core::{AppConfig, Category, FileConfig, Record};
use nightcity_scout::{ScrapeOptions, Scout};

#[derive(Parser)]
#[command(name = "nightcity")]
#[command(about = "Cyberpunk wiki scraper and catalog generator")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "NIGHTCITY_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape wiki pages into the entity tree
    Scrape {
        #[arg(long, value_enum, default_value_t = Target::All)]
        category: Target,

        /// Maximum subjects per category
        #[arg(long)]
        limit: Option<usize>,

        /// Bypass the request cache
        #[arg(long)]
        no_cache: bool,

        /// Render character pages in headless Chromium for extra images
        #[arg(long)]
        browser: bool,

        /// Re-scrape characters that are already captured
        #[arg(long)]
        all: bool,
    },

    /// Regenerate the aggregate catalogs from the entity tree
    Generate {
        #[arg(long, value_enum, default_value_t = Target::All)]
        category: Target,
    },

    /// Read and edit generated catalogs
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Print every entry of a catalog
    List { category: String },

    /// Print one entry by id
    Get { category: String, id: u64 },

    /// Update fields of one entry: `field=value` (JSON values are parsed)
    Set {
        category: String,
        id: u64,
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Characters,
    Gangs,
    Districts,
    All,
}

impl Target {
    fn categories(self) -> Vec<Category> {
        match self {
            Target::Characters => vec![Category::Characters],
            Target::Gangs => vec![Category::Gangs],
            Target::Districts => vec![Category::Districts],
            Target::All => Category::TOP_LEVEL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let mut config = AppConfig::from_env()?;

    match cli.command {
        Commands::Scrape {
            category,
            limit,
            no_cache,
            browser,
            all,
        } => {
            if browser {
                config.file.browser.enabled = true;
            }
            let options = ScrapeOptions {
                limit,
                skip_existing: !all,
            };
            scrape(config.file, &category.categories(), &options, no_cache).await
        }
        Commands::Generate { category } => generate(&config.file, &category.categories()),
        Commands::Catalog(cmd) => catalog(&config.file, cmd),
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("nightcity=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn scrape(
    file: FileConfig,
    categories: &[Category],
    options: &ScrapeOptions,
    no_cache: bool,
) -> Result<()> {
    let cache = if no_cache {
        RequestCache::disabled()
    } else {
        RequestCache::new(&file.paths.cache_dir)
    };
    let client = WikiClient::new(&file.wiki, cache).context("Failed to build wiki client")?;
    let fetcher: Arc<dyn WikiFetcher> = Arc::new(client);
    let enricher: Arc<dyn ImageEnricher> = if file.browser.enabled {
        Arc::new(ChromeEnricher::new(&file.browser))
    } else {
        Arc::new(NoopEnricher)
    };

    info!(categories = ?categories, limit = ?options.limit, "Night City scout starting...");
    let mut scout = Scout::new(fetcher, enricher, Arc::new(file));
    let stats = scout.run(categories, options).await;
    println!("{stats}");
    Ok(())
}

fn generate(file: &FileConfig, categories: &[Category]) -> Result<()> {
    let aggregator = Aggregator::from_config(file);
    for &category in categories {
        let count = aggregator
            .generate(category)
            .with_context(|| format!("Failed to write {} catalog", category))?;
        println!("{category}: {count} records");
    }
    Ok(())
}

fn catalog(file: &FileConfig, cmd: CatalogCommand) -> Result<()> {
    let editor = CatalogEditor::from_config(file);
    match cmd {
        CatalogCommand::List { category } => {
            let records = editor.read_all(&category)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        CatalogCommand::Get { category, id } => {
            let record = editor.read_one(&category, id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        CatalogCommand::Set {
            category,
            id,
            fields,
        } => {
            let patch = parse_assignments(&fields)?;
            let record = editor.update(&category, id, &patch)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

/// `field=value` pairs. Lists, objects and booleans are parsed as JSON; every
/// other value is stored as text, numbers included.
fn parse_assignments(fields: &[String]) -> Result<Record> {
    let mut patch = Record::new();
    for assignment in fields {
        let (field, raw) = assignment
            .split_once('=')
            .with_context(|| format!("Expected field=value, got {assignment:?}"))?;
        let field = field.trim();
        anyhow::ensure!(!field.is_empty(), "Empty field name in {assignment:?}");
        patch.insert(field, assignment_value(raw));
    }
    Ok(patch)
}

fn assignment_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    let structured = trimmed.starts_with('[') || trimmed.starts_with('{');
    if structured || matches!(trimmed, "true" | "false") {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }
    Value::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assignments_parse_structured_values_only() {
        let patch = parse_assignments(&[
            "leader=Royce".to_string(),
            "members_count=120".to_string(),
            r#"affiliations=["Maelstrom"]"#.to_string(),
        ])
        .unwrap();
        assert_eq!(patch.get("leader"), Some(&json!("Royce")));
        assert_eq!(patch.get("members_count"), Some(&json!("120")));
        assert_eq!(patch.get("affiliations"), Some(&json!(["Maelstrom"])));
    }

    #[test]
    fn scalar_assignments_stay_text() {
        let patch = parse_assignments(&[
            "danger_level=3".to_string(),
            "status=null".to_string(),
            "has_bounty=true".to_string(),
            "affiliations=[broken".to_string(),
        ])
        .unwrap();
        assert_eq!(patch.get("danger_level"), Some(&json!("3")));
        assert_eq!(patch.get("status"), Some(&json!("null")));
        assert_eq!(patch.get("has_bounty"), Some(&json!(true)));
        assert_eq!(patch.get("affiliations"), Some(&json!("[broken")));
    }

    #[test]
    fn assignment_without_equals_is_rejected() {
        assert!(parse_assignments(&["leader".to_string()]).is_err());
    }
}
