//! Gridboard - Main Server
//!
//! Collaborative project board backend: document store, real-time sync,
//! analytics, and due-task notifications.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gridboard::notify::NotificationScheduler;
use gridboard::store::DocumentStore;
use gridboard::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gridboard")]
#[command(about = "Collaborative project board server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one due-task notification scan and exit
    NotifyScan,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gridboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            gridboard::start_server(config).await
        }
        Commands::NotifyScan => run_notify_scan(config).await,
    }
}

async fn run_notify_scan(config: Config) -> Result<()> {
    let store = Arc::new(DocumentStore::new(&config.data_dir)?);
    let notifier = gridboard::build_notifier(&config)?;
    let scheduler = NotificationScheduler::new(
        store,
        notifier,
        Duration::from_secs(config.notify_interval_secs),
        config.notify_lookahead_hours,
    );

    let outcome = scheduler.scan().await?;
    tracing::info!(
        "Scan complete: {} notified, {} projects skipped, {} persist failures",
        outcome.notified,
        outcome.skipped_projects,
        outcome.persist_failures
    );

    Ok(())
}
