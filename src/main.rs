//! # Gemstore CLI (`gemstore`)
//!
//! ## Usage
//!
//! ```bash
//! gemstore --config ./config/gemstore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gemstore init` | Create the SQLite database and run schema migrations |
//! | `gemstore serve` | Start the HTTP API |
//! | `gemstore reconcile-types` | Merge duplicate gem/jewelry category entries |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gemstore::{config, logging, migrate, reconcile, server};

/// Gemstore: catalog, orders, and enquiries backend for a gem and jewelry store.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gemstore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gemstore",
    about = "Catalog, orders, and enquiries backend for a gem and jewelry store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gemstore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent. Does nothing for the in-memory backend.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Merge duplicate entries in the gem and jewelry category indexes.
    ReconcileTypes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            if cfg.db.backend == config::Backend::Memory {
                println!("In-memory backend configured; nothing to initialize.");
            } else {
                migrate::run_migrations(&cfg).await?;
                println!("Database initialized successfully.");
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::ReconcileTypes => {
            reconcile::run_reconcile(&cfg).await?;
        }
    }

    Ok(())
}
