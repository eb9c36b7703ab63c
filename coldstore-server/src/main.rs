//! ColdStore Server - HTTP exposition of compression metrics and reports

mod api;

use anyhow::Context;
use coldstore_core::reporting::{ReportScheduler, Reporter, ReporterConfig};
use coldstore_core::{CompressionManager, ManagerConfig};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the config file when no argument is given
const CONFIG_ENV: &str = "COLDSTORE_CONFIG";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address; the port comes from `reporter.http_port`
    pub host: IpAddr,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub manager: ManagerConfig,
    pub reporter: ReporterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            log_json: false,
            manager: ManagerConfig::default(),
            reporter: ReporterConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.reporter.http_port)
    }

    fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = match &path {
        Some(path) if path.exists() => ServerConfig::load(path)?,
        _ => ServerConfig::default(),
    };

    init_tracing(config.log_json);

    match &path {
        Some(path) if path.exists() => info!("Loaded config from {}", path.display()),
        Some(path) => warn!("Config file {} not found, using defaults", path.display()),
        None => info!("No config file given, using defaults"),
    }

    info!("Starting ColdStore server v{}", coldstore_core::VERSION);
    info!("Report directory: {:?}", config.reporter.report_dir);

    let manager = Arc::new(CompressionManager::new(config.manager.clone())?);
    let reporter = Arc::new(Reporter::new(
        Arc::clone(manager.monitor()),
        config.reporter.clone(),
    )?);
    let scheduler = Arc::new(ReportScheduler::new(Arc::clone(&reporter))?);

    let token = CancellationToken::new();
    let scheduler_task = Arc::clone(&scheduler).start(token.clone());

    let app = api::create_router(api::AppState {
        manager: Arc::clone(&manager),
        reporter,
        scheduler,
    });

    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ColdStore server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    scheduler_task.await?;
    manager.shutdown();
    info!("ColdStore server stopped");

    Ok(())
}
