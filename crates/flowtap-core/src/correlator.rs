//! Transaction correlator
//!
//! Every outbound frame to a client opens a transaction: a freshly generated
//! UUID travels inside the frame's `"id"` field, the client echoes it back in
//! its reply, and the correlator routes the reply to whichever task is
//! waiting on that ID. Correlation is purely by ID, never by connection
//! identity or message order, so clients may answer out of order or
//! interleave unrelated traffic.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::registry::ClientHandle;

/// Receiving end of one pending transaction
///
/// Resolved at most once. Dropped senders (abandoned transactions) surface as
/// [`RelayError::Abandoned`].
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<Value>,
}

impl PendingReply {
    /// Suspend until the matching reply arrives, yielding the payload with
    /// its `"id"` field stripped
    pub async fn recv(self) -> Result<Value> {
        let mut payload = self.rx.await.map_err(|_| RelayError::Abandoned)?;
        if let Some(object) = payload.as_object_mut() {
            object.remove("id");
        }
        Ok(payload)
    }
}

/// The waiter table: transaction ID to single-fulfillment sender
///
/// Removal happens exactly once per ID, on resolution or abandonment, under
/// the same lock that looks the waiter up, so a reply can never be delivered
/// twice.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction: generate a fresh ID and register its waiter
    pub async fn begin(&self) -> (String, PendingReply) {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().await;
        let transaction_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !pending.contains_key(&candidate) {
                break candidate;
            }
        };
        pending.insert(transaction_id.clone(), tx);
        (transaction_id, PendingReply { rx })
    }

    /// Attach `transaction_id` to the frame and write it to the client
    ///
    /// A write failure is an implicit disconnect; the caller must abandon the
    /// waiter rather than resolve it.
    pub fn send(&self, client: &ClientHandle, transaction_id: &str, mut frame: Value) -> Result<()> {
        if let Some(object) = frame.as_object_mut() {
            object.insert("id".to_string(), Value::String(transaction_id.to_string()));
        }
        debug!(
            connection_id = %client.connection_id(),
            transaction_id = %transaction_id,
            "sending request to client"
        );
        client.send_text(frame.to_string())
    }

    /// Route one raw inbound frame to its waiter
    ///
    /// Malformed JSON, a missing `"id"`, or an ID with no live waiter are all
    /// logged and dropped; nothing here can fail the flow being processed.
    pub async fn resolve(&self, connection_id: Uuid, raw: &str) {
        if let Err(err) = self.try_resolve(connection_id, raw).await {
            warn!(
                connection_id = %connection_id,
                error = %err,
                "dropping inbound client frame"
            );
        }
    }

    async fn try_resolve(&self, connection_id: Uuid, raw: &str) -> Result<()> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|err| RelayError::MalformedPayload(format!("inbound frame: {err}")))?;
        let transaction_id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RelayError::MalformedPayload("inbound frame without a transaction ID".to_string())
            })?;

        let waiter = self.pending.lock().await.remove(&transaction_id);
        let Some(tx) = waiter else {
            return Err(RelayError::UnknownTransaction(transaction_id));
        };

        debug!(
            connection_id = %connection_id,
            transaction_id = %transaction_id,
            "received reply from client"
        );
        if tx.send(payload).is_err() {
            debug!(
                connection_id = %connection_id,
                transaction_id = %transaction_id,
                "waiter gone before reply delivery"
            );
        }
        Ok(())
    }

    /// Discard a waiter without resolving it (send failure, timeout, or
    /// client disconnect)
    pub async fn abandon(&self, transaction_id: &str) {
        self.pending.lock().await.remove(transaction_id);
    }

    /// Number of transactions still awaiting a reply
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
