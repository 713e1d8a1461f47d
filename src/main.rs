use std::net::SocketAddr;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nebula_backend::{AppState, Config, db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nebula_backend=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Nebula Backend server...");

    // Load configuration; a missing JWT secret is a startup failure
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        "Environment: {}, Server: {}",
        config.environment,
        config.server_address()
    );

    // Initialize the metadata store
    let meta = db::open_metadata(&config.database_directory, &config.database_directory_file)
        .map_err(|e| anyhow::anyhow!("failed to initialize metadata database: {e}"))?;

    // Configure CORS
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Ignoring invalid origin '{origin}': {err}");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION]);

    let state = AppState::new(meta, config.clone());
    let app = routes::router(state).layer(cors);

    let addr: SocketAddr = config.server_address().parse()?;
    tracing::info!("Server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
