//! WebSocket listener
//!
//! Owns the transport side of the relay: accepting client connections,
//! pumping outbound frames from the per-client channel into the socket, and
//! feeding every inbound text frame to the correlator. Registration happens
//! on a completed handshake; any read or write failure deregisters the
//! client, which the pipeline observes as an implicit disconnect.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::correlator::Correlator;
use crate::error::{RelayError, Result};
use crate::registry::{ClientHandle, ClientRegistry};

/// Bind the listener socket. The one fatal startup error.
pub(crate) async fn bind(config: &RelayConfig) -> Result<TcpListener> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind { addr, source })?;
    Ok(listener)
}

/// Accept connections until the shutdown signal fires, then tear down the
/// remaining connections and drain their tasks
pub(crate) async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    correlator: Arc<Correlator>,
    max_frame_bytes: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    let registry = registry.clone();
                    let correlator = correlator.clone();
                    connections.spawn(handle_connection(
                        stream,
                        peer_addr,
                        registry,
                        correlator,
                        max_frame_bytes,
                    ));
                }
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    drop(listener);
    connections.shutdown().await;
    // Aborted connection tasks never reach their own deregistration.
    registry.clear().await;
    info!("WebSocket listener stopped");
}

/// Serve one client from handshake to teardown
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    correlator: Arc<Correlator>,
    max_frame_bytes: usize,
) {
    let connection_id = Uuid::new_v4();

    // No compression; message size bounded only by configuration, since full
    // request/response bodies travel base64-encoded inside single frames.
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(max_frame_bytes);
    ws_config.max_frame_size = Some(max_frame_bytes);
    let websocket =
        match tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await {
            Ok(websocket) => websocket,
            Err(err) => {
                warn!(peer_addr = %peer_addr, error = %err, "WebSocket handshake failed");
                return;
            }
        };

    info!(
        connection_id = %connection_id,
        peer_addr = %peer_addr,
        "client connected"
    );

    let (mut sink, mut stream) = websocket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    registry
        .register(Arc::new(ClientHandle::new(connection_id, outbound_tx)))
        .await;

    // Outbound pump: drains the client's frame channel into the socket. A
    // write failure ends the connection; the dropped receiver then turns
    // every later send into an implicit-disconnect error for the sender.
    let write_pump = async {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(err) = sink.send(frame).await {
                debug!(connection_id = %connection_id, error = %err, "write failed");
                break;
            }
        }
    };

    // Inbound pump: every text frame is a candidate transaction reply.
    let read_pump = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => correlator.resolve(connection_id, &text).await,
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => correlator.resolve(connection_id, &text).await,
                    Err(_) => {
                        warn!(
                            connection_id = %connection_id,
                            "non-UTF-8 binary frame from client, ignoring"
                        );
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!(connection_id = %connection_id, error = %err, "read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = write_pump => {}
        _ = read_pump => {}
    }

    registry.deregister(connection_id).await;
    let _ = sink.close().await;
    info!(connection_id = %connection_id, "client disconnected");
}
