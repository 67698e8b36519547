//! Flowtap Core Library
//!
//! A remote interception relay for HTTP(S) proxy flows. The relay sits
//! inside a MITM proxy engine's traffic pipeline and offers every in-flight
//! request/response pair to externally connected WebSocket clients, which
//! may inspect, filter, and rewrite the traffic before it continues. The
//! proxy engine itself (flow production, final wire application) is an
//! external collaborator; this crate owns the correlation and sequencing
//! protocol.
//!
//! # Modules
//!
//! - [`relay`] - `InterceptionRelay` lifecycle facade and engine hooks
//! - [`pipeline`] - the per-flow two-stage client walk
//! - [`correlator`] - transaction-ID waiter table
//! - [`registry`] - connected-client registry
//! - [`server`] - WebSocket listener
//! - [`protocol`] - wire frame variants
//! - [`codec`] - JSON projections of requests and responses
//! - [`message`] - HTTP message types
//! - [`flow`] - flow and phase types
//! - [`config`] - relay configuration
//! - [`error`] - error types

pub mod codec;
pub mod config;
pub mod correlator;
pub mod error;
pub mod flow;
pub mod message;
mod pipeline;
pub mod protocol;
pub mod registry;
pub mod relay;
mod server;

// Re-export commonly used types
pub use config::RelayConfig;
pub use correlator::{Correlator, PendingReply};
pub use error::{RelayError, Result};
pub use flow::{Flow, Phase};
pub use message::{Headers, Request, Response};
pub use protocol::{MessageSet, MessageSetSettings};
pub use registry::{ClientHandle, ClientRegistry};
pub use relay::InterceptionRelay;
