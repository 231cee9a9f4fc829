use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::api::{self, AppState};
use super::db::SqliteDocumentStore;
use super::models::Category;
use super::store::{DocumentKey, DocumentStore};
use super::ws::{self, WsMessage, broadcast_message};

/// How often the database file is checked for writes from other processes.
const EXTERNAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the board server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub board_key: DocumentKey,
    pub default_category: Category,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3150,
            db_path: PathBuf::from(".stockboard/board.db"),
            dev_mode: false,
            board_key: DocumentKey::board(),
            default_category: Category::default(),
        }
    }
}

/// Build the full application router with API and WebSocket routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router()
        .route(
            "/ws",
            get(move |ws_upgrade, watch| ws::ws_handler(ws_upgrade, watch, ws_tx)),
        )
        .with_state(state)
}

pub fn build_state(store: Arc<dyn DocumentStore>, config: &ServerConfig) -> Arc<AppState> {
    let (ws_tx, _rx) = broadcast::channel::<WsMessage>(256);
    Arc::new(AppState {
        store,
        ws_tx,
        board_key: config.board_key.clone(),
        default_category: config.default_category,
    })
}

/// Start the board server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let store = SqliteDocumentStore::open(&config.db_path)
        .with_context(|| format!("Failed to open board database {}", config.db_path.display()))?;
    store.sync_external_writes().await?;
    let state = build_state(Arc::new(store.clone()), &config);
    let relay = spawn_external_relay(store, state.ws_tx.clone());

    let mut app = build_router(state);

    // Dev mode serves a separately hosted UI and listens on all interfaces.
    let host = if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
        "0.0.0.0"
    } else {
        config.host.as_str()
    };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, db = %config.db_path.display(), "board server listening");
    println!("Stockboard running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    relay.abort();

    info!("board server stopped");
    println!("Server shut down gracefully.");
    Ok(())
}

/// Forward one round of writes made by other processes (CLI sessions,
/// a second server) to WebSocket clients. Returns how many documents changed.
pub async fn relay_external_writes(
    store: &SqliteDocumentStore,
    ws_tx: &broadcast::Sender<WsMessage>,
) -> Result<usize> {
    let changed = store.sync_external_writes().await?;
    for (key, body) in &changed {
        let listeners = broadcast_message(ws_tx, WsMessage::changed(key, body.clone()));
        info!(key = %key, listeners, "relayed external document write");
    }
    Ok(changed.len())
}

fn spawn_external_relay(
    store: SqliteDocumentStore,
    ws_tx: broadcast::Sender<WsMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EXTERNAL_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = relay_external_writes(&store, &ws_tx).await {
                warn!(error = %e, "failed to check for external writes");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
