//! manus HTTP Server
//!
//! Axum server that runs the tool-using agent for each incoming message.

mod config;
mod handlers;
mod sessions;
mod state;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manus_core::ToolRegistry;
use manus_runtime::GeminiGateway;

use crate::config::ServerConfig;
use crate::handlers::{health_check, list_tools, run_handler};
use crate::sessions::SessionStore;
use crate::state::AppState;

const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Build the HTTP router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/run", post(run_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();

    let gateway = Arc::new(GeminiGateway::from_env()?);
    tracing::info!(model = %config.agent.generation.model, "Gemini gateway ready");

    let mut tools = ToolRegistry::new();
    tools.register_many(manus_tools::builtin_tools(&config.tools));
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let sessions = SessionStore::new(config.memory.clone());
    if !sessions.enabled() {
        tracing::info!("Session memory disabled");
    }

    // Periodically forget idle sessions
    let purger = sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = purger.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, remaining = purger.len(), "Purged idle sessions");
            }
        }
    });

    let state = AppState {
        gateway,
        tools,
        agent: config.agent,
        sessions,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("manus server running on http://{}", config.bind_addr);
    tracing::info!("  GET  /health     - Health check");
    tracing::info!("  GET  /api/tools  - List tools");
    tracing::info!("  POST /api/run    - Run the agent on a message");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
