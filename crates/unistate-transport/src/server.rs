//! WebSocket transport server using Axum.
//!
//! Handles the HTTP upgrade to WebSocket, enforces the connection limit, and
//! hands every accepted socket to a [`ConnectionHandler`] on its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{ConnectInfo, State, WebSocketUpgrade, ws::WebSocket},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::client::ClientConnection;
use crate::ws::WsChannel;

/// Implemented by whatever serves a single connection (the router).
/// The transport calls this once per accepted WebSocket.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serve one connection until its channel ends.
    fn serve(
        &self,
        client: ClientConnection,
        channel: WsChannel,
    ) -> impl std::future::Future<Output = ()> + Send;
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
    /// Enable verbose connection logging
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            hostname: "0.0.0.0".into(),
            enable_cors: false,
            max_connections: Some(64),
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: ConnectionHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    /// Connected client count (for health check)
    client_count: Arc<AtomicUsize>,
}

/// The transport server: accepts WebSocket connections and serves each one.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound address
    local_addr: SocketAddr,
    client_count: Arc<AtomicUsize>,
}

impl TransportServer {
    /// Bind and start serving with the given connection handler.
    pub async fn start<H: ConnectionHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_shared(config, Arc::new(handler)).await
    }

    /// Like [`TransportServer::start`], for a handler that is also held
    /// elsewhere.
    pub async fn start_shared<H: ConnectionHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let client_count = Arc::new(AtomicUsize::new(0));

        let state = Arc::new(AppState {
            handler,
            config: config.clone(),
            client_count: client_count.clone(),
        });

        let mut app = Router::new()
            .route("/ws", get(ws_upgrade_handler::<H>))
            .route("/health", get(health_handler::<H>))
            .with_state(state);
        if config.enable_cors {
            app = app.layer(CorsLayer::permissive());
        }

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!("unistate transport listening on ws://{local_addr}/ws");

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            local_addr,
            client_count,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently being served.
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    /// Gracefully stop the server.
    ///
    /// Stops accepting and waits for open connections to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("unistate transport server stopped");
    }
}

/// One reserved connection slot. Taken before the upgrade is accepted and
/// released on drop, including when the handler panics.
struct ConnectionSlot {
    count: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    /// Reserve a slot unless `max` are already taken.
    fn acquire(count: &Arc<AtomicUsize>, max: Option<usize>) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match max {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            })
            .ok()?;
        Some(Self {
            count: Arc::clone(count),
        })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler<H: ConnectionHandler>(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    let Some(slot) = ConnectionSlot::acquire(&state.client_count, state.config.max_connections)
    else {
        warn!(
            "Connection rejected: max connections reached ({})",
            state.config.max_connections.unwrap_or_default()
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.on_upgrade(move |socket| handle_ws_connection(socket, remote_addr, state, slot))
        .into_response()
}

async fn health_handler<H: ConnectionHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(Ordering::Acquire),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection<H: ConnectionHandler>(
    socket: WebSocket,
    remote_addr: SocketAddr,
    state: Arc<AppState<H>>,
    slot: ConnectionSlot,
) {
    let total = state.client_count.load(Ordering::Acquire);

    let client = ClientConnection::new(Some(remote_addr));
    let client_id = client.id.clone();
    if state.config.verbose_logging {
        info!("Client connected: {client_id} from {remote_addr} (total: {total})");
    } else {
        info!("Client connected: {client_id}");
    }

    state.handler.serve(client.clone(), WsChannel::new(socket)).await;

    drop(slot);
    info!(
        "Client disconnected: {client_id} after {:.1}s (total: {})",
        client.connected_for().as_secs_f64(),
        state.client_count.load(Ordering::Acquire)
    );
}
