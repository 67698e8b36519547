//! Connected-client registry
//!
//! Tracks every live WebSocket client in connection order. The pipeline
//! iterates over point-in-time snapshots, so clients connecting or dropping
//! mid-flow never disturb an iteration already under way.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::error::{RelayError, Result};

/// Handle to one connected client
///
/// Holds the outbound frame channel drained by the connection's writer task.
/// A send failure means the writer is gone and is treated as an implicit
/// disconnect by every caller.
#[derive(Debug)]
pub struct ClientHandle {
    connection_id: Uuid,
    outbound: mpsc::UnboundedSender<Message>,
}

impl ClientHandle {
    pub fn new(connection_id: Uuid, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            connection_id,
            outbound,
        }
    }

    /// Connection identifier, used in every log line about this client
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Queue one text frame for delivery to the client
    pub fn send_text(&self, text: String) -> Result<()> {
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| RelayError::Transport {
                connection_id: self.connection_id,
                reason: "connection writer gone".to_string(),
            })
    }

    /// Whether the connection has already gone away
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Registry of connected clients in first-connected order
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Arc<ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client at the end of the iteration order
    pub async fn register(&self, client: Arc<ClientHandle>) {
        self.clients.lock().await.push(client);
    }

    /// Remove a client. Removing one already absent is a no-op.
    pub async fn deregister(&self, connection_id: Uuid) {
        self.clients
            .lock()
            .await
            .retain(|client| client.connection_id() != connection_id);
    }

    /// Drop every client at once (listener shutdown)
    pub async fn clear(&self) {
        self.clients.lock().await.clear();
    }

    /// Point-in-time copy of the client list, in registration order
    ///
    /// Later registrations and deregistrations never affect a snapshot that
    /// has already been taken.
    pub async fn snapshot(&self) -> Vec<Arc<ClientHandle>> {
        self.clients.lock().await.clone()
    }

    /// Number of currently registered clients
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}
