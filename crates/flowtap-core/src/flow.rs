//! Flow types
//!
//! A [`Flow`] is one logical HTTP transaction tracked by the embedding proxy
//! engine. The engine owns every flow for its whole lifetime; the relay only
//! borrows one mutably while clients take their turns on it.

use std::fmt;

use crate::message::{Request, Response};

/// One in-flight HTTP transaction
#[derive(Debug, Clone)]
pub struct Flow {
    /// Stable identifier assigned by the proxy engine
    pub id: String,
    /// Current request, possibly already rewritten by an earlier client
    pub request: Request,
    /// Current response, present once the upstream has answered
    pub response: Option<Response>,
}

impl Flow {
    /// Create a flow in its request phase (no response yet)
    pub fn new(id: impl Into<String>, request: Request) -> Self {
        Self {
            id: id.into(),
            request,
            response: None,
        }
    }
}

/// The two points at which a flow is offered to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The request is about to leave for the upstream
    Request,
    /// The upstream response is about to return to the requester
    Response,
}

impl Phase {
    /// Wire name of the pre-flight stage for this phase
    pub fn preflight_stage(&self) -> &'static str {
        match self {
            Phase::Request => "pre_request",
            Phase::Response => "pre_response",
        }
    }

    /// Wire name of the full-content stage for this phase
    pub fn full_stage(&self) -> &'static str {
        match self {
            Phase::Request => "request",
            Phase::Response => "response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_stage())
    }
}
