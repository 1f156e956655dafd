use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dm_roulette::{api, auth::AdminPin, broadcast, config::AppConfig, state::AppState};

#[tokio::main]
async fn main() {
    // .env must be applied before the config reads the environment
    if let Err(e) = dotenvy::dotenv() {
        // A missing file is fine
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: ignoring malformed .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dm_roulette=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DM Roulette...");

    let config = AppConfig::from_env();

    let store = match config.store.build(config.game.join_timeout) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to initialize store: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Store backend: {}", store.name());

    let state = Arc::new(AppState::new(
        store,
        config.scenario_catalog(),
        config.game.clone(),
    ));
    let admin_pin = Arc::new(AdminPin::new(config.admin_pin.clone()));

    // Relay store changes to WebSocket subscribers
    broadcast::spawn_store_relay(state.clone());

    // Announce expired rounds
    broadcast::spawn_round_end_watcher(state.clone());

    let app = api::router(state, admin_pin)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
