//! taskdesk-server - Main entry point
//!
//! Configuration priority: CLI argument / `TASKDESK_*` environment variable,
//! then the TOML config file, then compiled defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use taskdesk_common::config::{load_toml_config, ConfigOverrides, ServerConfig};
use taskdesk_common::db::init_database;
use taskdesk_server::ingest::DiskTempStorage;
use taskdesk_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for taskdesk-server
#[derive(Parser, Debug)]
#[command(name = "taskdesk-server")]
#[command(about = "Admin task distribution service")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config_dir>/taskdesk/config.toml)
    #[arg(short, long, env = "TASKDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "TASKDESK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "TASKDESK_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// SQLite database file
    #[arg(long = "database", env = "TASKDESK_DATABASE")]
    database_path: Option<PathBuf>,

    /// Directory for temporary upload files
    #[arg(long, env = "TASKDESK_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Token signing secret
    #[arg(long, env = "TASKDESK_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Maximum upload request size in bytes
    #[arg(long, env = "TASKDESK_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Upload processing timeout in seconds
    #[arg(long, env = "TASKDESK_UPLOAD_TIMEOUT_SECS")]
    upload_timeout_secs: Option<u64>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "TASKDESK_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            bind_address: self.bind_address.clone(),
            database_path: self.database_path.clone(),
            upload_dir: self.upload_dir.clone(),
            jwt_secret: self.jwt_secret.clone(),
            max_upload_bytes: self.max_upload_bytes,
            upload_timeout_secs: self.upload_timeout_secs,
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("taskdesk_server={level},taskdesk_common={level},tower_http={level}").into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load config")?;
    let config = ServerConfig::resolve(args.overrides(), toml_config)
        .context("Invalid configuration")?;

    init_tracing(&config.log_level);

    info!("Starting taskdesk-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", config.database_path.display());
    info!("Upload directory: {}", config.upload_dir.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    DiskTempStorage::new(&config.upload_dir)
        .ensure_dir()
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let state = AppState::from_config(pool, &config);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("taskdesk-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
