//! # docvec CLI
//!
//! The `docvec` binary ingests documents into per-use-case vector
//! collections, either from local paths or through the HTTP upload server.
//!
//! ## Usage
//!
//! ```bash
//! docvec --config ./config/docvec.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docvec collection <label>` | Print the collection name for a use-case label |
//! | `docvec init` | Create the SQLite schema (sqlite backend) |
//! | `docvec ingest <paths>...` | Load, split, embed, and store files and directories |
//! | `docvec serve` | Start the HTTP upload server |
//! | `docvec completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! docvec collection "Technical Docs"          # rag_technical_docs
//! docvec ingest ./manuals --use-case "Technical Docs"
//! docvec ingest notes.md data.json --dry-run
//! docvec serve --config ./config/docvec.toml
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use docvec::{collection, config, ingest_cmd, logging, migrate, server};

/// docvec: document ingestion for retrieval-augmented generation.
///
/// Commands other than `collection` and `completions` read a TOML
/// configuration file. See `config/docvec.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docvec",
    about = "docvec: extract, chunk, embed, and store documents into per-use-case vector collections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docvec.toml`. A missing file at the default
    /// location means built-in defaults; an explicit path must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline progress to stderr (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_CONFIG_PATH: &str = "./config/docvec.toml";

#[derive(Subcommand)]
enum Commands {
    /// Print the collection name derived from a use-case label.
    ///
    /// Lowercases the label, replaces spaces with underscores, and adds
    /// the `rag_` prefix.
    Collection {
        /// Use-case label, e.g. "Technical Docs".
        label: String,
    },

    /// Initialize the SQLite schema.
    ///
    /// Only meaningful for `store.backend = "sqlite"`. Idempotent.
    Init,

    /// Ingest files and directories.
    ///
    /// Directories are walked recursively. Files whose extension is not
    /// pdf, txt, md, or json are reported as unsupported and skipped.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Use-case label; selects the target collection.
        #[arg(long)]
        use_case: Option<String>,

        /// Glob of relative paths to skip inside directories (repeatable).
        #[arg(long)]
        exclude: Vec<String>,

        /// Load and split only; report counts without embedding or storing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the HTTP upload server on `[server].bind`.
    Serve,

    /// Print shell completion script to stdout.
    Completions {
        shell: Shell,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<config::Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(&default)
            } else {
                Ok(config::Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Collection { label } => {
            println!("{}", collection::collection_name(label));
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "docvec", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Init => {
            if cfg.store.backend != "sqlite" {
                anyhow::bail!(
                    "init creates the SQLite schema; store.backend is '{}'",
                    cfg.store.backend
                );
            }
            migrate::run_migrations(&cfg.store).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            paths,
            use_case,
            exclude,
            dry_run,
        } => {
            ingest_cmd::run_ingest(&cfg, &paths, &exclude, use_case.as_deref(), dry_run).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Collection { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}
