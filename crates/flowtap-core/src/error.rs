//! Relay error types

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the relay
///
/// Only [`RelayError::Bind`] is fatal, and only during startup. Everything
/// else describes a failed interaction with a single client: the client is
/// skipped or dropped and the flow proceeds unmodified.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The WebSocket listener could not bind its address
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The relay listener is already running
    #[error("relay listener already running")]
    AlreadyRunning,

    /// Write failure on a client connection, treated as an implicit disconnect
    #[error("transport failure on connection {connection_id}: {reason}")]
    Transport {
        connection_id: uuid::Uuid,
        reason: String,
    },

    /// Inbound payload could not be decoded into the expected shape
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Inbound reply referenced a transaction with no live waiter
    #[error("unknown transaction {0:?}")]
    UnknownTransaction(String),

    /// The client did not reply to a transaction before the deadline
    #[error("client reply timed out after {0:?}")]
    ReplyTimeout(Duration),

    /// The waiter was discarded before a reply arrived (client disconnect)
    #[error("transaction abandoned before a reply arrived")]
    Abandoned,
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
