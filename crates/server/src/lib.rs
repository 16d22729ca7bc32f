//! Chatline Server Library
//!
//! Presence-aware direct and group messaging: durable message log, delivery
//! status lifecycle, typing relay and live reactions over WebSockets.

pub mod config;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod protocol;
pub mod resolver;
pub mod store;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::{AppState, ServerConfig};
pub use error::{Error, Result};

use handlers::{
    create_group, delete_message, get_conversation, get_group_messages, hide_message,
    list_groups, list_users, login, register, search_messages, send_message,
};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatline=info,tower_http=info"));
    // a subscriber installed earlier (tests, embedding) wins
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Full HTTP + WebSocket surface over `state`
pub fn app(state: AppState) -> Router {
    Router::new()
        // Identity endpoints
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/users", get(list_users))
        // Groups
        .route("/api/groups", post(create_group))
        .route("/api/groups/{identity}", get(list_groups))
        // Messages
        .route("/api/messages", post(send_message))
        .route("/api/messages/{id}/{peer}", get(get_conversation))
        .route("/api/messages/{id}", delete(delete_message))
        .route("/api/messages/{id}/hide", post(hide_message))
        .route("/api/group-messages/{group_id}", get(get_group_messages))
        .route("/api/search-messages/{identity}/{query}", get(search_messages))
        // Real-time session
        .route("/ws", get(gateway::ws_handler))
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("=== Chatline Server ===");

    let config = ServerConfig::from_env();
    info!("Data directory: {:?}", config.data_dir);
    info!("Directory database: {:?}", config.database_path);

    let state = AppState::open(config.clone()).await?;
    info!("Directory, message store and delivery hub initialized");

    let app = app(state);

    info!("Chatline listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - Chatline Server"
}
