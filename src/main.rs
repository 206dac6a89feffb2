// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::condition_service::ConditionService;
use crate::application::condition_store::ConditionStore;
use crate::application::graph_service::GraphService;
use crate::application::isu_service::IsuService;
use crate::application::trend_service::TrendService;
use crate::infrastructure::config::{load_app_config, StoreBackend, StoreSettings};
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::mysql_store::MySqlStore;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    let offset = config.display.offset()?;

    // Create store (infrastructure layer)
    let store = open_store(&config.store).await?;

    // Create services (application layer)
    let state = Arc::new(AppState {
        isu_service: IsuService::new(store.clone()),
        graph_service: GraphService::new(store.clone(), offset),
        condition_service: ConditionService::new(store.clone()),
        trend_service: TrendService::new(store),
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Starting isu-condition service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}

async fn open_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn ConditionStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            let store = match &settings.fixture {
                Some(path) => MemoryStore::load_fixture(path)?,
                None => MemoryStore::new(),
            };
            tracing::info!("Using in-memory store");
            Ok(Arc::new(store))
        }
        StoreBackend::Mysql => {
            let store = MySqlStore::connect(&settings.mysql).await?;
            tracing::info!(
                "Connected to MySQL {}:{}/{}",
                settings.mysql.host,
                settings.mysql.port,
                settings.mysql.database
            );
            Ok(Arc::new(store))
        }
    }
}
