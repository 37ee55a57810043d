use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subsync::cluster::{
    ClientBehavior, HttpMasterLink, MasterBehavior, NodeBehavior, ReplicationClient, Role,
    SyncSettings,
};
use subsync::storage::{self, seed, Stores};
use subsync::tokens::TokenAuthority;
use subsync::{api, cluster, config::Config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "subsync starting");

    // Load configuration
    let config = Config::load()?;
    info!(
        node = %config.node.name,
        role = %config.node.role,
        "Loaded configuration"
    );

    let authority = Arc::new(TokenAuthority::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl(),
    ));

    let mut sync_handle = None;

    let node: Arc<dyn NodeBehavior> = match config.node.role {
        Role::Master => {
            let backend = storage::open_backend(&config)?;
            let stores = Arc::new(Stores::new(backend));

            if let Some(ref path) = config.storage.seed_file {
                let stats = seed::apply_seed_file(&stores, path)
                    .await
                    .with_context(|| format!("failed to apply seed file {}", path.display()))?;
                info!(users = stats.users, nodes = stats.nodes, "Applied seed file");
            }

            let admin_key = config.auth.admin_api_key.clone().unwrap_or_default();
            Arc::new(MasterBehavior::new(
                config.node.name.clone(),
                Arc::clone(&authority),
                stores,
                admin_key,
            ))
        }
        Role::Client => {
            let master_api = config
                .sync
                .master_api
                .clone()
                .context("MASTER_API must be set on a client node")?;

            // Shared HTTP client for pulls from the master
            let http_client = reqwest::Client::builder()
                .pool_idle_timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(2)
                .build()?;

            let link = Arc::new(HttpMasterLink::new(master_api.as_str(), http_client));
            let replication = Arc::new(ReplicationClient::new(
                config.node.name.clone(),
                Arc::clone(&authority),
                link,
                SyncSettings::from(&config.sync),
            ));
            info!(master = %master_api, "Replicating from master");

            sync_handle = Some(cluster::start_initial_sync(Arc::clone(&replication)));
            Arc::new(ClientBehavior::new(replication))
        }
    };

    let state = Arc::new(AppState { node });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sync_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
