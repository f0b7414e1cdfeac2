//! Airdrop Claim - NFT claim pages backed by a threshold signing network
//!
//! Serves the claim session API, signs claim transactions through the
//! configured signing service and broadcasts them to the target chain.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use airdrop_claim::api::{self, AppState};
use airdrop_claim::chain::{ChainProvider, ChainRegistry, ChainRpc};
use airdrop_claim::claim::{ClaimParams, MintFlow};
use airdrop_claim::config::{Settings, SigningMode};
use airdrop_claim::metadata::{HttpMetadataStore, MetadataCatalog, MetadataResolver};
use airdrop_claim::metrics::MetricsServer;
use airdrop_claim::session::SessionManager;
use airdrop_claim::signing::{
    ConfiguredAuth, GatewaySigningClient, LocalSigningService, SigningService,
};
use airdrop_claim::tx::{GasEstimator, TransactionSender};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Airdrop Claim v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {}",
        settings.claim.chain
    );

    // Chain registry and RPC connection
    let registry = Arc::new(ChainRegistry::builtin().with_overrides(&settings.chains));
    let chain = registry
        .resolve(&settings.claim.chain)
        .with_context(|| format!("Claim chain {} is not in the registry", settings.claim.chain))?
        .clone();
    let rpc: Arc<dyn ChainRpc> = Arc::new(ChainProvider::new(&settings.rpc.url, chain.chain_id)?);
    info!("RPC connection initialized for {} ({})", chain.name, chain.chain_id);

    // Signing service
    let signing: Arc<dyn SigningService> = match settings.signing.mode {
        SigningMode::Gateway => {
            let url = settings.signing.gateway_url.as_deref().unwrap_or_default();
            Arc::new(GatewaySigningClient::new(url, &settings.signing.network)?)
        }
        SigningMode::Local => Arc::new(LocalSigningService::from_env(
            &settings.signing.local_private_key_env,
            rpc.clone(),
        )?),
    };
    if let Err(e) = signing.connect().await {
        // Every mint retries the connection
        error!("Signing network {} not reachable yet: {}", signing.network(), e);
    }

    // Metadata
    let catalog = Arc::new(MetadataCatalog::new(settings.metadata.catalog.clone())?);
    info!("Metadata catalog holds {} entries", catalog.len());
    let resolver = MetadataResolver::new(
        Arc::new(HttpMetadataStore::new()?),
        settings.metadata_timeout(),
    );

    // Claim flow and sessions
    let sender = TransactionSender::new(
        signing.clone(),
        rpc.clone(),
        registry.clone(),
        &settings.claim.signature_name,
    )
    .with_execute_timeout(settings.execute_timeout());
    let flow = Arc::new(MintFlow::new(
        ClaimParams::from_settings(&settings),
        catalog,
        signing,
        rpc,
        GasEstimator::new(settings.claim.gas_multiplier),
        sender,
    ));
    let sessions = Arc::new(SessionManager::new(
        flow,
        Arc::new(ConfiguredAuth::new(settings.auth.clone())),
        resolver,
        Some(chain),
    ));

    // Evict sessions left behind by closed tabs
    let sweeper_handle = sessions.clone().spawn_sweeper(settings.session_ttl());

    // Start API server
    let api_handle = tokio::spawn({
        let state = AppState {
            sessions: sessions.clone(),
            explainer_url: settings.pages.explainer_url.clone(),
        };
        let config = settings.server.clone();
        async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Airdrop Claim is running");
    info!("API server: http://{}:{}", settings.server.host, settings.server.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    sweeper_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Airdrop Claim stopped with {} open sessions", sessions.len());
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,airdrop_claim=debug,hyper=warn"));

    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
