//! geosift - spatial clustering service for geotagged posts
//!
//! # Usage
//!
//! ```bash
//! # Load a JSON-lines post dump into ./data
//! geosift import --file posts.jsonl
//!
//! # Serve on 0.0.0.0:5000
//! geosift serve
//!
//! # Poll a search
//! curl localhost:5000/analysis/v1.0/search/52.52/13.40/0.2/1600000000/1600086400?clusters=5
//! ```
//!
//! # Environment Variables
//!
//! - `GEOSIFT_CONFIG`: Path to a TOML config file (default: ./geosift.toml)
//! - `GEOSIFT_SERVER_ADDR`, `GEOSIFT_DATA_DIR`, `GEOSIFT_WORKERS`,
//!   `GEOSIFT_QUEUE_DEPTH`, `GEOSIFT_CORS_ORIGINS`: config overrides
//! - `GEOSIFT_LOG_JSON`: JSON log output
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use geosift::api::{create_app, GatewayState};
use geosift::bootstrap::open_collaborators;
use geosift::config::AppConfig;
use geosift::orchestrator::{JobOrchestrator, PipelineSettings};
use geosift::partition::KMeansPartitioner;
use geosift::retrieval::{read_posts, PostStore};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "geosift")]
#[command(about = "Spatial clustering and word statistics for geotagged posts")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:5000")
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the sled data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the number of job workers
    #[arg(long)]
    workers: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long, env = "GEOSIFT_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP gateway and job workers (default)
    Serve,

    /// Import posts from a JSON-lines file into the post store
    Import {
        /// Path to the JSON-lines file
        #[arg(long)]
        file: PathBuf,
    },
}

// ============================================================================
// Configuration
// ============================================================================

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = AppConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            info!(path = %path.display(), "Loaded config from --config");
            config
        }
        None => AppConfig::load(),
    };

    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        config.jobs.workers = workers;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_server(config: AppConfig) -> Result<()> {
    let collaborators = open_collaborators(&config.storage).await?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let orchestrator = Arc::new(JobOrchestrator::start(
        collaborators.store.clone(),
        collaborators.cache.clone(),
        Arc::new(KMeansPartitioner::new(config.kmeans)),
        PipelineSettings::from(&config.jobs),
        cancel_token.child_token(),
    ));

    let state = GatewayState {
        orchestrator: Arc::clone(&orchestrator),
        default_clusters: config.jobs.default_clusters,
        max_clusters: config.jobs.max_clusters,
    };
    let app = create_app(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
    info!(addr = %config.server.addr, "HTTP server listening");

    let server_token = cancel_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await
        .context("HTTP server error")?;

    orchestrator.shutdown().await;
    if let Err(e) = collaborators.db.flush_async().await {
        warn!(error = %e, "Final storage flush failed");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn run_import(config: AppConfig, file: PathBuf) -> Result<()> {
    let reader = std::fs::File::open(&file)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let posts = read_posts(reader).with_context(|| format!("Failed to parse {}", file.display()))?;
    let parsed = posts.len();

    let collaborators = open_collaborators(&config.storage).await?;
    let written = collaborators
        .store
        .insert_posts(posts)
        .await
        .context("Failed to write posts")?;

    info!(
        file = %file.display(),
        parsed,
        written,
        total = collaborators.store.len(),
        "Import complete"
    );
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = load_config(&args)?;
    info!(
        addr = %config.server.addr,
        data_dir = %config.storage.data_dir.display(),
        workers = config.jobs.workers,
        queue_depth = config.jobs.queue_depth,
        join = %config.jobs.join,
        "geosift starting"
    );

    match args.command {
        Some(SubCommand::Import { file }) => run_import(config, file).await,
        Some(SubCommand::Serve) | None => run_server(config).await,
    }
}
