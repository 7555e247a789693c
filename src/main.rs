//! # ReadNest CLI (`readnest`)
//!
//! ## Usage
//!
//! ```bash
//! readnest --config ./config/readnest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `readnest init` | Create the primary database and run schema migrations |
//! | `readnest serve` | Start the HTTP API server |
//! | `readnest check` | Report primary reachability and fallback file health |
//!
//! Log verbosity comes from `RUST_LOG` when set, otherwise from
//! `[logging].filter` in the config file. Logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use readnest::{check, config, migrate, server};

/// ReadNest storage backend for journals, feeds, articles and documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/readnest.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "readnest",
    about = "ReadNest: journals, feeds, articles and documents over a primary store with local fallback",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/readnest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the primary database schema.
    ///
    /// Creates the database file and all tables. Idempotent.
    Init,

    /// Start the HTTP API server.
    ///
    /// Requests are served by the primary store and fall back to the local
    /// JSON files whenever it is unreachable.
    Serve,

    /// Check storage health.
    ///
    /// Probes the primary store and validates every fallback file.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Check => {
            check::run_check(&cfg).await?;
        }
    }

    Ok(())
}
