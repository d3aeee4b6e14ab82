use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use probhub::app::App;
use probhub::config::Config;
use probhub::models::{ProblemQuery, SortMode, SourceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortArg {
    New,
    Top,
    Trending,
}

impl From<SortArg> for SortMode {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::New => SortMode::New,
            SortArg::Top => SortMode::Top,
            SortArg::Trending => SortMode::Trending,
        }
    }
}

/// Mines problem statements from online communities.
#[derive(Parser)]
#[command(name = "probhub", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or refresh the built-in source catalog
    Seed,

    /// Run one ingestion pass over a source
    Ingest {
        /// hackernews or stackexchange
        source: String,
        /// Only fetch items created after this RFC 3339 timestamp
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
    },

    /// List stored problems
    List {
        /// Free-text search over title and description
        #[arg(long)]
        q: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Require this tag (repeatable; all must match)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, value_enum, default_value = "new")]
        sort: SortArg,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one problem
    Show { id: i64 },

    /// List sources
    Sources,

    /// List tags
    Tags,

    /// Stop a source from being ingested
    Pause { source: String },

    /// Re-enable a paused source
    Resume { source: String },
}

fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let app = App::new(&config)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path))?;

    match cli.command {
        Commands::Seed => {
            app.repository.seed_sources().await?;
            print_json(&app.sources().await?)?;
        }
        Commands::Ingest { source, since } => {
            let stats = app
                .ingest(&source, since)
                .await
                .with_context(|| format!("ingestion of {source} failed"))?;
            print_json(&stats)?;
        }
        Commands::List {
            q,
            source,
            tags,
            sort,
            page,
            page_size,
        } => {
            let query = ProblemQuery {
                q,
                source,
                tags,
                sort: sort.into(),
                page,
                page_size,
            };
            print_json(&app.list(&query).await?)?;
        }
        Commands::Show { id } => match app.show(id).await? {
            Some(problem) => print_json(&problem)?,
            None => anyhow::bail!("problem {id} not found"),
        },
        Commands::Sources => print_json(&app.sources().await?)?,
        Commands::Tags => print_json(&app.tags().await?)?,
        Commands::Pause { source } => {
            app.set_source_status(&source, SourceStatus::Paused).await?;
        }
        Commands::Resume { source } => {
            app.set_source_status(&source, SourceStatus::Active).await?;
        }
    }

    Ok(())
}
