use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use linkpulse::analytics::{
    AggregationEngine, ClickRecorder, CountryResolver, DisabledCountryResolver,
    HttpCountryResolver,
};
use linkpulse::api::{create_api_router, AppState};
use linkpulse::config::{Config, DatabaseBackend};
use linkpulse::redirect::create_redirect_router;
use linkpulse::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    // Initialize database
    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    // Geolocation is best-effort; disabling it just leaves countries absent.
    let geo: Arc<dyn CountryResolver> = if config.geo.enabled {
        info!(
            "Geolocation lookups enabled via {} ({}ms timeout)",
            config.geo.endpoint, config.geo.timeout_ms
        );
        Arc::new(HttpCountryResolver::new(&config.geo)?)
    } else {
        info!("Geolocation lookups disabled");
        Arc::new(DisabledCountryResolver)
    };

    let recorder = Arc::new(ClickRecorder::new(Arc::clone(&storage), geo));
    let engine = AggregationEngine::new(Arc::clone(&storage));

    // Create routers
    let api_state = Arc::new(AppState {
        storage: Arc::clone(&storage),
        engine,
        public_base_url: config.public_base_url.clone(),
    });
    let api_router = create_api_router(api_state);
    let redirect_router = create_redirect_router(Arc::clone(&storage), recorder);

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("API server listening on http://{}/api", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("Redirect server listening on http://{}", redirect_addr);

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>()
        ),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>()
        ),
    )?;

    Ok(())
}
