//! Axum-based gateway for the Botan dialogue engine. Config-driven via
//! CoreConfig; chat runs through the shared turn pipeline with per-client
//! sessions and observer fan-out.

mod handlers;
mod state;
mod voice;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use botan_core::{CoreConfig, OllamaBridge};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(target: "botan::gateway", error = %e, "configuration load failed");
            std::process::exit(1);
        }
    };

    let bridge = Arc::new(
        OllamaBridge::new(
            &config.ollama_host,
            &config.model,
            config.generation_timeout_secs,
        )
        .with_analysis_model(&config.analysis_model),
    );

    let app_name = config.app_name.clone();
    let port = config.port;
    let state = Arc::new(AppState::new(config, bridge));

    let app = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/stats", get(handlers::stats))
        .route("/api/config", get(handlers::config_view))
        .route("/ws/chat", get(handlers::ws_chat))
        .route("/ws/obs", get(handlers::ws_observe))
        .with_state(state.clone())
        .layer(CorsLayer::permissive());

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(target: "botan::gateway", "{} listening on {}", app_name, addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(target: "botan::gateway", error = %e, "bind failed on {}", addr);
            std::process::exit(1);
        }
    };
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(target: "botan::gateway", error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(target: "botan::gateway", "shutdown requested, persisting sessions");
            let client_ids: Vec<String> = state
                .sessions
                .iter()
                .map(|entry| entry.key().clone())
                .collect();
            for client_id in client_ids {
                state.persist_session(&client_id).await;
            }
        }
    }
}
