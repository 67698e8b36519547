//! Relay lifecycle facade
//!
//! [`InterceptionRelay`] bundles the listener, client registry, and
//! transaction correlator into one value the embedding proxy engine holds.
//! The engine drives it through four hooks: `start` when the proxy comes up,
//! `on_request`/`on_response` for every flow phase, and `shutdown` on the way
//! down. There is no module-level state; two relays in one process stay
//! fully independent.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::RelayConfig;
use crate::correlator::Correlator;
use crate::error::{RelayError, Result};
use crate::flow::{Flow, Phase};
use crate::pipeline;
use crate::registry::ClientRegistry;
use crate::server;

struct ListenerState {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The interception relay: WebSocket API server plus flow pipeline
pub struct InterceptionRelay {
    config: RelayConfig,
    registry: Arc<ClientRegistry>,
    correlator: Arc<Correlator>,
    listener: Mutex<Option<ListenerState>>,
}

impl InterceptionRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ClientRegistry::new()),
            correlator: Arc::new(Correlator::new()),
            listener: Mutex::new(None),
        }
    }

    /// Bind the WebSocket listener and start accepting clients
    ///
    /// Returns the bound address, which matters when the configured port is
    /// 0. Bind failure is fatal to startup and surfaced to the engine.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut listener_slot = self.listener.lock().await;
        if listener_slot.is_some() {
            return Err(RelayError::AlreadyRunning);
        }

        let listener = server::bind(&self.config).await?;
        let local_addr = listener.local_addr().map_err(|source| RelayError::Bind {
            addr: self.config.bind_addr(),
            source,
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(server::accept_loop(
            listener,
            self.registry.clone(),
            self.correlator.clone(),
            self.config.max_frame_bytes,
            shutdown_rx,
        ));

        info!(address = %local_addr, "WebSocket API server listening at ws://{local_addr}");
        *listener_slot = Some(ListenerState {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Address the listener is bound to, if running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(|s| s.local_addr)
    }

    /// Stop accepting, close every client connection, and wait for the
    /// listener task to drain. A no-op when the relay is not running.
    pub async fn shutdown(&self) {
        let state = self.listener.lock().await.take();
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(true);
            let _ = state.task.await;
        }
    }

    /// Offer a flow to all connected clients at its request phase
    ///
    /// Must complete before the engine forwards the request upstream; the
    /// flow's request reflects every accepted replacement afterwards.
    pub async fn on_request(&self, flow: &mut Flow) {
        pipeline::process_flow(
            &self.registry,
            &self.correlator,
            flow,
            Phase::Request,
            self.config.reply_timeout(),
        )
        .await;
    }

    /// Offer a flow to all connected clients at its response phase
    ///
    /// A no-op until the flow carries a response.
    pub async fn on_response(&self, flow: &mut Flow) {
        pipeline::process_flow(
            &self.registry,
            &self.correlator,
            flow,
            Phase::Response,
            self.config.reply_timeout(),
        )
        .await;
    }

    /// Number of currently connected clients
    pub async fn client_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}
