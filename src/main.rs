//! # elastic-scout CLI (`escout`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `escout create [db]` | Create a fresh SQLite database with the schema |
//! | `escout search <keyword>` | Find Elasticsearch hosts via Shodan |
//! | `escout scrape` | List the indices on every known host |
//! | `escout sample` | Pull sample documents from every non-empty index |
//! | `escout dump` | Print all samples as one JSON array |
//! | `escout stats` | Summarize what has been collected |
//!
//! ## Examples
//!
//! ```bash
//! escout create data.db
//! escout search --database data.db --api-key "$SHODAN_API_KEY" "port:9200"
//! escout scrape --database data.db
//! escout sample --database data.db --count 5
//! escout dump --database data.db > samples.json
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use elastic_scout::config::{self, Config};
use elastic_scout::elastic::ElasticConnector;
use elastic_scout::shodan::ShodanClient;
use elastic_scout::store::Store;
use elastic_scout::{dump, ingest, logging, migrate, sample, scrape, stats};

/// elastic-scout: discover exposed Elasticsearch servers and sample
/// their contents into SQLite.
#[derive(Parser)]
#[command(
    name = "escout",
    about = "Discover exposed Elasticsearch servers via Shodan and sample their indices into SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/escout.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty SQLite database for storing results.
    ///
    /// Refuses to run if the file already exists.
    Create {
        /// Database file.
        #[arg(default_value = "data.db")]
        database: PathBuf,
    },

    /// Search Shodan for Elasticsearch servers matching a keyword.
    Search {
        /// Database file.
        #[arg(long, default_value = "data.db")]
        database: PathBuf,

        /// Shodan API key. Overrides `[search].api_key` and `SHODAN_API_KEY`.
        #[arg(long)]
        api_key: Option<String>,

        /// Extra Shodan search terms appended to the base query.
        keyword: String,
    },

    /// Query each known server and record the names and sizes of its indices.
    Scrape {
        /// Database file.
        #[arg(long, default_value = "data.db")]
        database: PathBuf,
    },

    /// Pull a few sample documents from every non-empty index.
    Sample {
        /// Database file.
        #[arg(long, default_value = "data.db")]
        database: PathBuf,

        /// Number of documents to sample per index.
        #[arg(long)]
        count: Option<u32>,
    },

    /// Dump collected samples as one JSON array on stdout.
    Dump {
        /// Database file.
        #[arg(long, default_value = "data.db")]
        database: PathBuf,
    },

    /// Show host, index, and sample counts.
    Stats {
        /// Database file.
        #[arg(long, default_value = "data.db")]
        database: PathBuf,
    },
}

impl Commands {
    fn database(&self) -> &Path {
        match self {
            Commands::Create { database }
            | Commands::Search { database, .. }
            | Commands::Scrape { database }
            | Commands::Sample { database, .. }
            | Commands::Dump { database }
            | Commands::Stats { database } => database,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let database = cli.command.database().to_path_buf();

    if let Commands::Create { .. } = cli.command {
        if database.exists() {
            eprintln!("Database file '{}' already exists.", database.display());
            std::process::exit(1);
        }
        migrate::create_database(&database, &cfg.db).await?;
        println!("Database created: {}", database.display());
        return Ok(());
    }

    if !database.exists() {
        eprintln!("Database file '{}' does not exist", database.display());
        std::process::exit(1);
    }

    let store = Store::open(&database, &cfg).await?;
    let result = run(cli.command, &store, &cfg, &database).await;
    store.close().await;
    result
}

async fn run(command: Commands, store: &Store, cfg: &Config, database: &Path) -> anyhow::Result<()> {
    match command {
        // Creation never reaches an open store; see `main`.
        Commands::Create { .. } => {}
        Commands::Search {
            api_key, keyword, ..
        } => {
            let key = ingest::resolve_api_key(api_key, &cfg.search)?;
            let client = ShodanClient::new(&cfg.search, key)?;
            let report = ingest::run_search(store, &client, Some(&keyword), &cfg.search).await?;
            println!("search \"{}\"", report.query);
            println!("  total results: {}", report.total_reported);
            println!("  fetched: {}", report.fetched);
            println!("New IP addresses added: {}", report.new_hosts);
        }
        Commands::Scrape { .. } => {
            let connector = Arc::new(ElasticConnector::new(&cfg.elasticsearch)?);
            let filter = Arc::new(cfg.exclusion_filter()?);
            let report =
                scrape::run_scrape(store, connector, filter, cfg.pipeline.workers).await?;
            println!("scrape");
            println!("  hosts: {}", report.hosts);
            println!("  failed hosts: {}", report.failed_hosts);
            println!("  indexes written: {}", report.indexes);
        }
        Commands::Sample { count, .. } => {
            let count = count.unwrap_or(cfg.pipeline.default_sample_count);
            let connector = Arc::new(ElasticConnector::new(&cfg.elasticsearch)?);
            let report = sample::run_sample(store, connector, count, cfg.pipeline.workers).await?;
            println!("sample");
            println!("  indexes: {}", report.indexes);
            println!("  failed: {}", report.failed);
            println!("  samples written: {}", report.samples);
        }
        Commands::Dump { .. } => {
            dump::run_dump(store).await?;
        }
        Commands::Stats { .. } => {
            stats::run_stats(store, database).await?;
        }
    }
    Ok(())
}
