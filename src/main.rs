use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use tabular_chat::{
    agents::AgentFactory, config::Config, create_router, session::SessionStore,
    types::AppError, utils::init_logger, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("tabular_chat=debug,tower_http=debug,axum=debug");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // The server still ingests and plots without a key; queries report the
    // missing credential.
    let agent_factory = match AgentFactory::from_config(&config) {
        Ok(factory) => Some(Arc::new(factory)),
        Err(AppError::MissingCredential(provider)) => {
            warn!(%provider, "No LLM API key configured, queries are disabled");
            None
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to configure LLM backend: {}", e)),
    };

    // Create shared state
    let state = AppState {
        sessions: SessionStore::new(config.ingest.clone()),
        agent_factory,
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let ip: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST {}: {}", config.server.host, e))?;
    let addr = SocketAddr::from((ip, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
