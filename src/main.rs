use pawdash::api::DashboardApi;
use pawdash::config::Config;
use pawdash::docker::DockerManager;
use pawdash::lifecycle::{LifecycleConfig, LifecycleManager};
use pawdash::reconcile::Reconciler;
use pawdash::store::CodeStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pawdash=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    info!(path = %config_path.display(), "Configuration loaded");
    print_startup_banner(&config);

    // Connect to the container runtime before accepting any requests
    let docker = Arc::new(DockerManager::new(config.docker.docker_host.as_deref()).await?);

    // The code store root must exist before the first listing
    let store = CodeStore::new(&config.store.code_root);
    store.ensure_root()?;
    info!(root = %store.root().display(), "Code store ready");

    let lifecycle = Arc::new(LifecycleManager::new(
        Arc::clone(&docker),
        store.clone(),
        LifecycleConfig {
            network: config.docker.network.clone(),
            image: config.docker.image.clone(),
            app_port: config.docker.app_port,
            base_domain: config.docker.base_domain.clone(),
        },
    ));

    let reconciler = Reconciler::new(
        Arc::clone(&docker),
        store.clone(),
        config.docker.base_domain.clone(),
    );

    // Create shutdown channel and wire it to ctrl-c
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let api = Arc::new(DashboardApi::new(
        config.server.bind_addr()?,
        store,
        lifecycle,
        reconciler,
        config.server.default_log_tail,
        shutdown_rx,
    ));

    api.run().await
}

fn print_startup_banner(config: &Config) {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting pawdash"
    );
    info!(
        bind = %config.server.bind,
        port = config.server.port,
        "Management API settings"
    );
    info!(
        code_root = %config.store.code_root,
        base_domain = %config.docker.base_domain,
        "App settings"
    );
    info!(
        network = %config.docker.network,
        image = %config.docker.image,
        app_port = config.docker.app_port,
        "Container runtime settings"
    );
}
