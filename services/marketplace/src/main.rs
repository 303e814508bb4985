use std::sync::Arc;

use pocketlegal_database::{create_pool, run_migrations, MemoryStore, PgStore, Store};
use pocketlegal_marketplace::{build_app, config::StoreBackend, AppConfig, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pocketlegal_marketplace=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            if config.is_production() {
                anyhow::bail!("STORE_BACKEND=memory is not allowed when APP_ENV=production");
            }
            tracing::warn!("Using the in-memory store, all data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let address = config.server.bind_address();
    let environment = config.environment;
    let app = build_app(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(?environment, "Marketplace service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
