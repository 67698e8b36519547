//! Passive tap client for a running relay
//!
//! Connects to a relay as an ordinary protocol client, answers every
//! pre-flight negotiation according to the command-line flags, prints what
//! it is shown, and always replies to full stages with an empty message set,
//! so observed traffic continues unmodified.

use flowtap_core::codec;
use flowtap_core::message::Headers;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// What the tap asks for and how it prints
pub struct TapOptions {
    /// WebSocket URL of the relay
    pub url: String,
    /// Pull full request content
    pub requests: bool,
    /// Pull full response content
    pub responses: bool,
    /// Emit raw JSON frames instead of formatted text
    pub json_output: bool,
}

/// Attach to the relay and run until the connection closes
pub async fn run_tap(options: &TapOptions) -> Result<(), String> {
    let (mut websocket, _) = tokio_tungstenite::connect_async(&options.url)
        .await
        .map_err(|e| format!("Failed to connect to {}: {e}", options.url))?;
    tracing::info!("Attached to relay at {}", options.url);

    while let Some(frame) = websocket.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return Err(format!("Connection error: {e}")),
        };
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring non-JSON frame from relay");
                continue;
            }
        };
        let Some(transaction_id) = value.get("id").cloned() else {
            tracing::warn!("Ignoring relay frame without a transaction ID");
            continue;
        };

        print_frame(&value, options);

        let mut reply = reply_for(&value, options);
        if let Some(object) = reply.as_object_mut() {
            object.insert("id".to_string(), transaction_id);
        }
        websocket
            .send(Message::Text(reply.to_string()))
            .await
            .map_err(|e| format!("Failed to reply to relay: {e}"))?;
    }

    tracing::info!("Relay connection closed");
    Ok(())
}

/// Build the reply for one relay frame
///
/// Pre-flight stages get the configured interest flags; full stages get an
/// empty message set (no change). Unknown stages are answered with an empty
/// object so the relay's transaction completes either way.
fn reply_for(frame: &Value, options: &TapOptions) -> Value {
    match frame["stage"].as_str() {
        Some("pre_request") | Some("pre_response") => json!({
            "send_request": options.requests,
            "send_response": options.responses,
        }),
        Some("request") | Some("response") => json!({}),
        other => {
            tracing::warn!(stage = ?other, "Unknown stage from relay");
            json!({})
        }
    }
}

fn print_frame(frame: &Value, options: &TapOptions) {
    if options.json_output {
        println!("{frame}");
        return;
    }
    match frame["stage"].as_str() {
        Some("pre_request") | Some("pre_response") => print_summary(frame),
        Some("request") | Some("response") => print_full(frame),
        _ => {}
    }
}

fn print_summary(frame: &Value) {
    let flow_id = frame["flow_id"].as_str().unwrap_or("-");
    let method = frame["request_summary"]["method"].as_str().unwrap_or("-");
    let url = frame["request_summary"]["url"].as_str().unwrap_or("-");

    if frame["stage"] == "pre_request" {
        println!("[{flow_id}] → {method} {url}");
    } else {
        let status = frame["response_summary"]["status_code"].as_u64().unwrap_or(0);
        let reason = frame["response_summary"]["reason"].as_str().unwrap_or("");
        println!("[{flow_id}] ← {status} {reason} ({method} {url})");
    }
}

fn print_full(frame: &Value) {
    let flow_id = frame["flow_id"].as_str().unwrap_or("-");

    if let Some(payload) = frame.get("request").filter(|v| !v.is_null()) {
        match codec::request_from_wire(payload) {
            Ok(request) => print_message(
                flow_id,
                "→",
                &request.to_string(),
                &request.headers,
                &request.body,
            ),
            Err(err) => tracing::warn!(error = %err, "Relay sent an undecodable request"),
        }
    }
    if let Some(payload) = frame.get("response").filter(|v| !v.is_null()) {
        match codec::response_from_wire(payload) {
            Ok(response) => print_message(
                flow_id,
                "←",
                &response.to_string(),
                &response.headers,
                &response.body,
            ),
            Err(err) => tracing::warn!(error = %err, "Relay sent an undecodable response"),
        }
    }
}

fn print_message(flow_id: &str, arrow: &str, first_line: &str, headers: &Headers, body: &[u8]) {
    println!("[{flow_id}] {arrow} {first_line}");
    for (name, value) in headers.iter() {
        println!("    {name}: {value}");
    }
    if body.is_empty() {
        return;
    }
    match std::str::from_utf8(body) {
        Ok(text) => println!("    {} bytes: {}", body.len(), preview(text)),
        Err(_) => println!("    {} bytes (binary)", body.len()),
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}
