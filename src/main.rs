//! Region router
//!
//! Redirects each request to the backend registered for its country.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────────┐
//!                  │                        REGION ROUTER                          │
//!                  │                                                               │
//!   Client ────────┼─▶ http::server ─▶ country_code ─▶ region ─▶ 30x / 503 / app   │
//!                  │                    (geocoder)        │                        │
//!                  │                                      ▼ snapshot               │
//!                  │                               routing::RoutingTable           │
//!                  │                                      ▲ replace_all            │
//!                  │                                      │                        │
//!                  │                           reload::ReloadOrchestrator          │
//!                  │                                      ▲ FIFO queue             │
//!                  │           ┌──────────────────────────┼──────────────┐         │
//!                  │    discovery::DiscoveryWatcher   SIGUSR2/SIGHUP   admin API    │
//!                  │           ▲                                                   │
//!                  └───────────┼───────────────────────────────────────────────────┘
//!                        Consul catalog / servers file
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use region_router::admin::{setup_admin_router, AdminState};
use region_router::config::{apply_env_overrides, load_config, validate_config, ConfigError, DiscoveryBackend};
use region_router::discovery::{ConsulSource, DiscoverySource, DiscoveryWatcher, FileSource};
use region_router::lifecycle::{spawn_reload_signals, spawn_shutdown_on_signal};
use region_router::observability::{logging, metrics};
use region_router::{HttpServer, ReloadOrchestrator, RouterConfig, RoutingTable, Shutdown};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "region-router", version)]
#[command(about = "Redirects requests to the backend serving their country", long_about = None)]
struct Args {
    /// Path to a TOML config file. Built-in defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Consul agent address (host:port or URL).
    #[arg(long)]
    consul_agent: Option<String>,

    /// Consul service to read region targets from.
    #[arg(long)]
    consul_service: Option<String>,

    /// Consul tag filter.
    #[arg(long)]
    consul_tag: Option<String>,

    /// Interface to listen on.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,
}

impl Args {
    fn apply(&self, config: &mut RouterConfig) {
        if let Some(agent) = &self.consul_agent {
            config.discovery.consul.address = agent.clone();
        }
        if let Some(service) = &self.consul_service {
            config.discovery.consul.service = service.clone();
        }
        if let Some(tag) = &self.consul_tag {
            config.discovery.consul.tag = tag.clone();
        }
        if self.host.is_some() || self.port.is_some() {
            let (current_host, current_port) = config
                .listener
                .bind_address
                .rsplit_once(':')
                .unwrap_or(("0.0.0.0", "7000"));
            let host = self.host.as_deref().unwrap_or(current_host);
            let port = self.port.map(|p| p.to_string()).unwrap_or_else(|| current_port.to_string());
            config.listener.bind_address = format!("{host}:{port}");
        }
    }
}

fn build_config(args: &Args) -> Result<RouterConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    apply_env_overrides(&mut config);
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn build_source(config: &RouterConfig) -> Result<Arc<dyn DiscoverySource>, Box<dyn std::error::Error>> {
    let source: Arc<dyn DiscoverySource> = match config.discovery.backend {
        DiscoveryBackend::Consul => Arc::new(ConsulSource::new(config.discovery.consul.clone())?),
        DiscoveryBackend::File => {
            let path = PathBuf::from(&config.discovery.file.path);
            if config.discovery.watch {
                Arc::new(FileSource::watching(&path)?)
            } else {
                Arc::new(FileSource::new(&path))
            }
        }
    };
    Ok(source)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = build_config(&args)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "region-router starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = ?config.discovery.backend,
        watch = config.discovery.watch,
        redirect_status = config.redirect.status_code,
        geocoder = config.geocoder.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let table = Arc::new(RoutingTable::new());
    let source = build_source(&config)?;

    let (orchestrator, reload) = ReloadOrchestrator::new(table.clone(), source.clone(), config.discovery.queue_capacity);
    match orchestrator.bootstrap().await {
        Ok(summary) => tracing::info!(
            routes = table.len(),
            skipped_duplicates = summary.skipped_duplicates,
            "Initial routing table loaded"
        ),
        Err(e) => tracing::error!(
            source = source.name(),
            error = %e,
            "Initial discovery failed, starting with an empty routing table"
        ),
    }
    let status = orchestrator.status();
    tokio::spawn(orchestrator.run(shutdown.subscribe()));

    if config.discovery.watch {
        let watcher = DiscoveryWatcher::new(
            source.clone(),
            reload.clone(),
            config.discovery.retry_base_delay_ms,
            config.discovery.retry_max_delay_ms,
        );
        tokio::spawn(watcher.run(shutdown.subscribe()));
    }

    if let Err(e) = spawn_reload_signals(reload.clone(), shutdown.subscribe()) {
        tracing::error!(error = %e, "Failed to install reload signal handlers");
    }
    spawn_shutdown_on_signal(shutdown.clone());

    if config.admin.enabled {
        let admin = setup_admin_router(AdminState {
            table: table.clone(),
            status,
            reload: reload.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");

        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, admin)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API server failed");
            }
        });
    }
    // The orchestrator exits once every handle is gone; only tasks hold one now.
    drop(reload);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, table);
    server.run(listener, shutdown.subscribe()).await?;

    shutdown.trigger();
    if shutdown.drain(SHUTDOWN_DEADLINE).await {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}
