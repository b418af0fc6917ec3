use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wardsim::api::{start_server, ApiContext};
use wardsim::assistant::AssistantGateway;
use wardsim::config::{self, ServerConfig};
use wardsim::db::Db;
use wardsim::rooms::{RoomCoordinator, RoomRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = ServerConfig::from_env()?;
    let db = Db::open(&server_config.database_path)?;
    let gateway = Arc::new(AssistantGateway::new(server_config.assistant.clone()));
    let coordinator = RoomCoordinator::new(db, Arc::new(RoomRegistry::new()), gateway);

    let ctx = ApiContext::new(coordinator);
    let server = start_server(ctx, server_config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Ready for connections");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    drop(server);
    Ok(())
}
