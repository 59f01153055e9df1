use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use step_battle::api::state::AppState;
use step_battle::api::views::ImageResolver;
use step_battle::calculate::{leaderboard_order, national_average};
use step_battle::client::StepsClient;
use step_battle::config::AppConfig;
use step_battle::standings::Standings;
use step_battle::storage::{JsonlStore, StorageConfig};

#[derive(Parser)]
#[command(name = "step-battle")]
#[command(about = "Prefecture step-count battle backend")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send one step report to a running server
    Report {
        #[arg(long)]
        uuid: String,

        /// Prefecture id (1-47)
        #[arg(long)]
        prefecture: i64,

        #[arg(long, allow_hyphen_values = true)]
        steps: i64,

        /// Server base URL (defaults to the configured bind address)
        #[arg(long)]
        server: Option<String>,

        /// Append to the local log instead. Only while no server is running.
        #[arg(long, conflicts_with = "server")]
        offline: bool,
    },

    /// Print the current standings from the local store (read-only)
    Standings {
        /// Number of rows to print
        #[arg(long, default_value = "47")]
        top: usize,
    },

    /// Print the effective configuration
    Config,
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting step-battle v{}", env!("CARGO_PKG_VERSION"));

    let storage = StorageConfig::new(config.data_dir.clone());

    match cli.command {
        Commands::Serve { host, port } => {
            let store = storage.open(config.storage.backend)?;
            let standings = Standings::new(store, config.ranking.tier_policy);
            let images = config.assets.image_base()?.map(ImageResolver::new);
            let state = AppState::new(
                standings,
                images,
                config.server.cors_origins.clone(),
                config.dev.enable_test_routes,
            );

            let app = step_battle::api::build_router(state);
            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(
                "Listening on http://{} (tier policy: {:?})",
                addr,
                config.ranking.tier_policy
            );
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            tracing::info!("Server stopped");
        }
        Commands::Report {
            uuid,
            prefecture,
            steps,
            server,
            offline,
        } => {
            if offline {
                let store = Arc::new(JsonlStore::open(storage.users_path())?);
                let standings = Standings::new(store, config.ranking.tier_policy);
                let record = standings.report_steps(&uuid, prefecture, steps).await?;
                println!(
                    "{} -> prefecture {} ({}), {} steps",
                    record.uuid,
                    record.prefecture_id,
                    record.prefecture_id.name(),
                    record.steps
                );
            } else {
                let base = server.unwrap_or_else(|| {
                    format!("http://{}:{}", config.server.host, config.server.port)
                });
                let client = StepsClient::new(base.as_str(), 10)?;
                client
                    .report(&uuid, prefecture, steps)
                    .await
                    .with_context(|| format!("Failed to report to {}", base))?;
                println!("{} -> prefecture {}, {} steps", uuid, prefecture, steps);
            }
        }
        Commands::Standings { top } => {
            let store = storage.open_snapshot(config.storage.backend)?;
            let standings = Standings::new(store, config.ranking.tier_policy);
            let ranked = standings.list().await?;

            println!("{:>4}  {:>3}  {:<8}  {:>10}  {:<6}", "rank", "id", "name", "avg", "status");
            for entry in leaderboard_order(&ranked).iter().take(top) {
                let rank = entry
                    .rank
                    .map(|r| (r + 1).to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>4}  {:>3}  {:<8}  {:>10}  {:<6}",
                    rank,
                    entry.prefecture_id.get(),
                    entry.prefecture_id.name(),
                    entry.average_steps,
                    entry.status.to_string()
                );
            }
            println!("national average: {}", national_average(&ranked));
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
