//! Interception protocol frames
//!
//! The relay speaks a two-stage protocol with every client, per flow and
//! phase: a pre-flight frame carrying only summaries ("do you want this
//! message at all?") followed, when requested, by a full frame carrying
//! complete content and accepting replacements. This module builds the
//! outbound frames and strictly parses the two inbound reply shapes. The
//! correlator owns the `"id"` field; frames here never carry one.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::codec;
use crate::error::{RelayError, Result};
use crate::flow::{Flow, Phase};
use crate::message::{Request, Response};

/// Build the pre-flight frame for a flow and phase
///
/// `response_summary` is null until the flow has a response.
pub fn preflight_frame(flow: &Flow, phase: Phase) -> Value {
    json!({
        "stage": phase.preflight_stage(),
        "flow_id": flow.id,
        "request_summary": codec::request_summary(&flow.request),
        "response_summary": flow
            .response
            .as_ref()
            .map(codec::response_summary)
            .unwrap_or(Value::Null),
    })
}

/// Build the full-content frame for a flow and phase
///
/// Each side is included only when the client asked for it in pre-flight,
/// and the response additionally only when the flow has one.
pub fn full_frame(flow: &Flow, phase: Phase, settings: &MessageSetSettings) -> Value {
    let request = if settings.send_request {
        codec::request_to_wire(&flow.request)
    } else {
        Value::Null
    };
    let response = match &flow.response {
        Some(response) if settings.send_response => codec::response_to_wire(response),
        _ => Value::Null,
    };
    json!({
        "stage": phase.full_stage(),
        "flow_id": flow.id,
        "request": request,
        "response": response,
    })
}

/// A client's pre-flight decision: which sides it wants in full
///
/// Absent fields mean "not wanted".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MessageSetSettings {
    #[serde(default)]
    pub send_request: bool,
    #[serde(default)]
    pub send_response: bool,
}

impl MessageSetSettings {
    /// Parse a pre-flight reply payload (the `"id"` field already stripped)
    pub fn from_reply(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|err| RelayError::MalformedPayload(format!("pre-flight reply: {err}")))
    }

    /// Whether a full-stage round trip is needed at all
    pub fn wants_any(&self) -> bool {
        self.send_request || self.send_response
    }
}

/// A client's full-stage reply: optional replacements for either side
///
/// Absent or null fields mean "no change".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSet {
    pub request: Option<Request>,
    pub response: Option<Response>,
}

impl MessageSet {
    /// Parse a full-stage reply payload (the `"id"` field already stripped)
    pub fn from_reply(value: &Value) -> Result<Self> {
        let request = match value.get("request") {
            None | Some(Value::Null) => None,
            Some(payload) => Some(codec::request_from_wire(payload)?),
        };
        let response = match value.get("response") {
            None | Some(Value::Null) => None,
            Some(payload) => Some(codec::response_from_wire(payload)?),
        };
        Ok(Self { request, response })
    }
}
