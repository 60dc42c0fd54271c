//! # agora-server
//!
//! Realtime direct-messaging server for the Agora platform.
//!
//! This binary provides:
//! - **WebSocket gateway** multiplexing sends, typing indicators, read
//!   receipts, presence, and call signaling per connected user
//! - **Delivery coordination**: messages are persisted first, then pushed
//!   live when the recipient is connected, with backlog flush on reconnect
//! - **REST API** (axum) as the request/response fallback for clients
//!   without a live connection
//! - **SQLite store** for conversations and messages

mod api;
mod auth;
mod config;
mod directory;
mod error;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agora_realtime::{
    CallRelay, ConnectionRegistry, DeliveryCoordinator, LogPushNotifier, PresenceRegistry,
    TypingTracker,
};
use agora_shared::constants::TYPING_SWEEP_INTERVAL_SECS;
use agora_store::Database;

use crate::api::AppState;
use crate::auth::BearerUuidResolver;
use crate::config::ServerConfig;
use crate::directory::InMemoryDirectory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agora_server=debug")),
        )
        .init();

    info!("Starting Agora messaging server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Durable store (runs migrations on open)
    let store = Arc::new(Mutex::new(Database::open_at(&config.db_path)?));

    // Live-side registries
    let presence = PresenceRegistry::new();
    let connections = ConnectionRegistry::new();
    let typing = TypingTracker::new(Duration::from_secs(config.typing_ttl_secs));

    // Delivery coordination with the default log-only push dispatcher; a
    // real deployment injects the platform's mobile-push client here.
    let coordinator = DeliveryCoordinator::new(
        store.clone(),
        presence.clone(),
        connections.clone(),
        Arc::new(LogPushNotifier),
    );

    let calls = CallRelay::new(connections.clone());

    let app_state = AppState {
        store,
        coordinator,
        presence,
        typing: typing.clone(),
        connections,
        calls,
        resolver: Arc::new(BearerUuidResolver),
        directory: Arc::new(InMemoryDirectory::new()),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic sweep of expired typing indicators, so a crashed client
    // never leaves a permanent "is typing" ghost.
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(TYPING_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let purged = typing.purge_expired().await;
            if purged > 0 {
                tracing::debug!(purged, "swept expired typing indicators");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
