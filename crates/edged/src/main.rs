//! edged — the EdgeGrid daemon.
//!
//! Single binary that assembles the EdgeGrid subsystems:
//! - Record store (redb or in-memory)
//! - Host platform (Kubernetes via kube-rs, or in-memory)
//! - Edge-cluster service (repository + search + provisioner)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! edged serve --config /etc/edgegrid/edgegrid.toml
//! edged serve --platform memory --port 8080
//! edged default-config > edgegrid.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use edgegrid_core::EdgeGridConfig;
use edgegrid_core::config::StoreBackend;
use edgegrid_orchestrator::EdgeClusterService;
use edgegrid_provisioner::{HostPlatform, KubePlatform, MemoryPlatform};
use edgegrid_state::{MemoryStore, PartitionStore, RedbStore, TenantRepository};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,edged=debug,edgegrid=debug";

#[derive(Parser)]
#[command(name = "edged", about = "EdgeGrid daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the edge-cluster API.
    Serve {
        /// Path to edgegrid.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding `server.port`.
        #[arg(long)]
        port: Option<u16>,

        /// Where edge-cluster workloads run.
        #[arg(long, value_enum, default_value_t = PlatformKind::Kube)]
        platform: PlatformKind,
    },

    /// Print the default configuration as TOML.
    DefaultConfig,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlatformKind {
    /// The Kubernetes cluster from the service account or kubeconfig.
    Kube,
    /// An in-process platform; nothing is actually run.
    Memory,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            port,
            platform,
        } => run_serve(config.as_deref(), port, platform).await,
        Command::DefaultConfig => {
            print!("{}", EdgeGridConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EdgeGridConfig> {
    match path {
        Some(path) => {
            EdgeGridConfig::from_file(path).with_context(|| format!("loading config from {}", path.display()))
        }
        None => {
            info!("no config file given, using defaults");
            Ok(EdgeGridConfig::default())
        }
    }
}

fn open_store(config: &EdgeGridConfig) -> anyhow::Result<Arc<dyn PartitionStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("using in-memory store; records are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redb => {
            let path = &config.store.path;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating data directory {}", parent.display()))?;
            }
            let store = RedbStore::open(path)?;
            info!(path = ?path, "state store opened");
            Ok(Arc::new(store))
        }
    }
}

async fn connect_platform(kind: PlatformKind, config: &EdgeGridConfig) -> anyhow::Result<Arc<dyn HostPlatform>> {
    match kind {
        PlatformKind::Kube => {
            let timeout = Duration::from_secs(config.provisioner.delete_timeout_secs);
            let platform = KubePlatform::try_default(timeout)
                .await
                .context("connecting to kubernetes")?;
            info!("kubernetes client initialized");
            Ok(Arc::new(platform))
        }
        PlatformKind::Memory => {
            warn!("using in-memory host platform; no workloads will run");
            Ok(Arc::new(MemoryPlatform::new()))
        }
    }
}

async fn run_serve(config_path: Option<&Path>, port: Option<u16>, platform: PlatformKind) -> anyhow::Result<()> {
    info!("EdgeGrid daemon starting");

    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    // ── Initialize subsystems ──────────────────────────────────

    let store = open_store(&config)?;
    let repo = TenantRepository::new(store);

    let platform = connect_platform(platform, &config).await?;
    info!(
        namespace = %config.provisioner.namespace,
        image = %config.provisioner.image,
        delete_service = config.provisioner.delete_service,
        "provisioner configured"
    );

    let service = EdgeClusterService::new(repo, platform, config.provisioner.clone());

    // ── Start API server ───────────────────────────────────────

    let router = edgegrid_api::build_router(service, Duration::from_secs(config.server.request_timeout_secs));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("EdgeGrid daemon stopped");
    Ok(())
}
