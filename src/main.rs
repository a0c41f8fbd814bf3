//! Gaimplan Knowledge Sync - Main Server
//!
//! Keeps a Markdown vault in sync with Neo4j and Qdrant.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gaimplan_sync::{notes, vault::Vault, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gaimplan-sync")]
#[command(about = "Background knowledge sync for Gaimplan vaults")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true, env = "GAIMPLAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync server (control loop, vault watcher and HTTP API)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Vault root (overrides config)
        #[arg(long)]
        vault: Option<String>,
    },

    /// Sync every note of the vault once, then exit
    Sync {
        /// Vault root (overrides config)
        #[arg(long)]
        vault: Option<String>,
    },

    /// Remove the vault from the graph and vector stores
    Clear {
        /// Vault root (overrides config)
        #[arg(long)]
        vault: Option<String>,
    },

    /// Print the note id of a vault-relative path
    NoteId {
        /// Path of the note relative to the vault root
        path: String,

        /// Vault root (overrides config)
        #[arg(long)]
        vault: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing (LOG_FORMAT=json for structured output)
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gaimplan_sync=debug,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, vault } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            if let Some(vault) = vault {
                config.vault_path = vault;
            }
            gaimplan_sync::start_server(config).await
        }
        Commands::Sync { vault } => {
            if let Some(vault) = vault {
                config.vault_path = vault;
            }
            tracing::info!("Syncing vault: {}", config.vault_path);
            let summary = gaimplan_sync::run_sync(config).await?;
            tracing::info!(
                "Sync complete: {} synced, {} failures, {} still queued",
                summary.synced,
                summary.failures,
                summary.remaining
            );
            Ok(())
        }
        Commands::Clear { vault } => {
            if let Some(vault) = vault {
                config.vault_path = vault;
            }
            let vault_id = gaimplan_sync::clear_vault(config).await?;
            tracing::info!("Cleared vault {} from both stores", vault_id);
            Ok(())
        }
        Commands::NoteId { path, vault } => {
            if let Some(vault) = vault {
                config.vault_path = vault;
            }
            let vault = Vault::open(&config.vault_path, config.vault_id.as_deref())?;
            println!("{}", notes::note_id(vault.id(), &path));
            Ok(())
        }
    }
}
