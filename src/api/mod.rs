pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::application::game_service::GameService;
use crate::config::{AppConfig, DatabaseBackend};
use crate::domain::services::GameRepository;
use crate::infrastructure::memory::MemoryGameRepository;
use crate::infrastructure::persistence::SqliteGameRepository;

pub async fn open_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn GameRepository>> {
    match config.database.backend {
        DatabaseBackend::Sqlite => {
            let repository =
                SqliteGameRepository::connect(&config.database.url, config.database.max_connections)
                    .await
                    .with_context(|| format!("opening database {}", config.database.url))?;
            repository
                .init_schema()
                .await
                .context("creating database schema")?;
            Ok(Arc::new(repository))
        }
        DatabaseBackend::Memory => Ok(Arc::new(MemoryGameRepository::new())),
    }
}

/// Periodically releases sessions nobody has touched for the idle timeout.
pub fn spawn_idle_sweeper(service: Arc<GameService>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let released = service.sweep_idle(service.idle_timeout()).await;
            if released > 0 {
                info!(released, live = service.registry().len(), "idle sweep");
            } else {
                debug!(live = service.registry().len(), "idle sweep");
            }
        }
    })
}

pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let repository = open_repository(&config).await?;
    let service = Arc::new(GameService::new(repository, config.session_settings()));
    spawn_idle_sweeper(Arc::clone(&service), config.sweep_interval());

    let app = routes::app_router(state::AppState::new(service));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
