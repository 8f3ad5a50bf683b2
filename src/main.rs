//! # regdoc CLI
//!
//! The `regdoc` binary ingests regulatory PDFs into a local hybrid index and
//! answers questions over them with cited, grounded answers.
//!
//! ## Usage
//!
//! ```bash
//! regdoc --config ./config/regdoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `regdoc init` | Create the SQLite index and run schema migrations |
//! | `regdoc ingest` | Load PDFs, chunk, dedup, embed, and rebuild the index |
//! | `regdoc query "<q>"` | Answer a question with hybrid retrieval |
//! | `regdoc demo` | Run the built-in demo queries and plot their metrics |
//! | `regdoc plot` | Regenerate the metrics plot from the metrics log |
//! | `regdoc stats` | Show what is indexed |
//!
//! ## Examples
//!
//! ```bash
//! # Index every PDF in ./data/pdfs
//! regdoc ingest
//!
//! # Smaller chunks from another directory
//! regdoc ingest --data-dir ./regs --chunk-size 1000 --overlap 100
//!
//! # Ask a question (requires GROQ_API_KEY)
//! regdoc query "What are the CSRD reporting thresholds?"
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use regdoc::config::{self, Config};
use regdoc::progress::ProgressMode;
use regdoc::{ingest, migrate, query, stats};

/// regdoc — hybrid-retrieval Q&A over regulatory PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means defaults. See `config/regdoc.example.toml`.
#[derive(Parser)]
#[command(
    name = "regdoc",
    about = "regdoc — grounded Q&A over regulatory PDFs with hybrid BM25 + embedding retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/regdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index schema.
    ///
    /// Creates the SQLite file and its tables. Safe to run repeatedly.
    Init,

    /// Build the index from a directory of PDFs.
    ///
    /// Replaces the existing index. Files that fail to load are skipped
    /// with a warning.
    Ingest {
        /// Directory to scan for `*.pdf` (overrides `[data].dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Maximum chunk length in characters (overrides `[chunking].chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks (overrides `[chunking].overlap`).
        #[arg(long)]
        overlap: Option<usize>,

        /// Progress output on stderr. Defaults to `human` on a TTY, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer a question from the indexed corpus.
    Query {
        /// The question.
        query: String,

        /// Do not append this query to the metrics log.
        #[arg(long)]
        no_log: bool,
    },

    /// Run the built-in demo queries, log them, and regenerate the plot.
    Demo,

    /// Regenerate the metrics plot from the metrics log.
    Plot,

    /// Show index statistics.
    Stats,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized successfully.");
        }
        Commands::Ingest {
            data_dir,
            chunk_size,
            overlap,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, data_dir, chunk_size, overlap, progress).await?;
        }
        Commands::Query {
            query: question,
            no_log,
        } => {
            query::run_query(&cfg, &question, !no_log).await?;
        }
        Commands::Demo => {
            query::run_demo(&cfg).await?;
        }
        Commands::Plot => {
            query::run_plot(&cfg)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
