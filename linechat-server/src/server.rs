//! TCP listener and shared server state

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use linechat_utils::{ChatError, Result};

use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::relay::Relay;
use crate::session;

/// Shared state handed to every session task
#[derive(Clone)]
pub struct ServerState {
    /// Live connection registry
    pub registry: Arc<Registry>,
    /// Broadcast relay over the registry
    pub relay: Relay,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Shutdown signal fan-out
    shutdown_tx: broadcast::Sender<()>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let relay = Relay::new(Arc::clone(&registry));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry,
            relay,
            config: Arc::new(config),
            shutdown_tx,
        }
    }

    /// Subscribe to the shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal the accept loop to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Bind the TCP listener
///
/// A bind failure is fatal at startup and surfaced to the operator through
/// the returned error.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.bind_addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ChatError::connection(format!("failed to bind {}: {}", addr, e)))
}

/// Run the accept loop until shutdown
///
/// Each accepted connection gets its own session task. A single failed
/// accept is logged and the loop continues.
pub async fn run_accept_loop(listener: TcpListener, state: ServerState) {
    let mut shutdown_rx = state.subscribe_shutdown();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        debug!("New connection from {}", peer_addr);
                        let state = state.clone();
                        tokio::spawn(async move {
                            session::run(stream, state).await;
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping accept loop");
                break;
            }
        }
    }
}
