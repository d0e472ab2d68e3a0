use axum::{Router, routing};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use ticketlink::api::{
    delete_source, handle_webhook, list_sources, register_source, update_branch_filter,
};
use ticketlink::db::{SourceStore, TrackerStore, init_db};
use ticketlink::error::ListenerError;
use ticketlink::{AppState, ListenerConfig};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "ticketlink.toml";

/// Load and parse the configuration file, falling back to defaults when it
/// does not exist
fn load_config(path: &str) -> Result<ListenerConfig, ListenerError> {
    if !Path::new(path).exists() {
        return Ok(ListenerConfig::default());
    }

    let config_str = fs::read_to_string(path).map_err(|e| {
        ListenerError::ConfigError(format!("Failed to read config file '{}': {}", path, e))
    })?;

    let config: ListenerConfig = toml::from_str(&config_str).map_err(|e| {
        ListenerError::ConfigError(format!("Failed to parse config file '{}': {}", path, e))
    })?;

    Ok(config)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config_path =
        std::env::var("TICKETLINK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config: ListenerConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Ok(addr) = std::env::var("BIND_ADDRESS") {
        config.bind_address = addr;
    }
    if let Ok(db_path) = std::env::var("DATABASE_PATH") {
        config.database_path = db_path;
    }

    let pool = match init_db(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Database error: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        sources: SourceStore::new(pool.clone()),
        tracker: TrackerStore::new(pool),
    });

    let app = Router::new()
        .route("/webhook", routing::post(handle_webhook))
        .route(
            "/api/sources",
            routing::get(list_sources).post(register_source),
        )
        .route(
            "/api/sources/{id}/branch-filter",
            routing::post(update_branch_filter),
        )
        .route("/api/sources/{id}", routing::delete(delete_source))
        .with_state(state);

    info!("Listening on {}", config.bind_address);
    info!("Using config at {:?}", config_path);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
