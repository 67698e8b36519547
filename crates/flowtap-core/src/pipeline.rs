//! Flow interception pipeline
//!
//! Walks the registered clients in connection order for one (flow, phase)
//! pair, performing the two-stage protocol with each: pre-flight negotiation
//! over summaries, then a full-content exchange when the client asked for
//! one. Accepted replacements land on the flow immediately, so each client
//! observes every mutation its predecessors made. No error a client can
//! produce ever fails the flow; the worst case is an unmodified pass-through.

use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::correlator::Correlator;
use crate::error::{RelayError, Result};
use crate::flow::{Flow, Phase};
use crate::protocol::{self, MessageSet, MessageSetSettings};
use crate::registry::{ClientHandle, ClientRegistry};

/// Offer one flow, in one phase, to every currently connected client
///
/// The client list is snapshotted once at entry; clients connecting later
/// catch the next flow. The response phase is a no-op until the flow has a
/// response.
pub(crate) async fn process_flow(
    registry: &ClientRegistry,
    correlator: &Correlator,
    flow: &mut Flow,
    phase: Phase,
    reply_timeout: Duration,
) {
    if phase == Phase::Response && flow.response.is_none() {
        return;
    }

    for client in registry.snapshot().await {
        // Clients may disconnect while earlier ones take their turn.
        if client.is_closed() {
            continue;
        }

        let preflight = protocol::preflight_frame(flow, phase);
        let reply = match transact(correlator, &client, preflight, reply_timeout).await {
            Ok(reply) => reply,
            Err(err) => {
                skip_client(&client, flow, phase, "pre-flight", &err);
                continue;
            }
        };
        let settings = match MessageSetSettings::from_reply(&reply) {
            Ok(settings) => settings,
            Err(err) => {
                skip_client(&client, flow, phase, "pre-flight", &err);
                continue;
            }
        };

        // Nothing requested: no full-stage round trip for this client.
        if !settings.wants_any() {
            continue;
        }

        let full = protocol::full_frame(flow, phase, &settings);
        let reply = match transact(correlator, &client, full, reply_timeout).await {
            Ok(reply) => reply,
            Err(err) => {
                skip_client(&client, flow, phase, "full stage", &err);
                continue;
            }
        };
        let message_set = match MessageSet::from_reply(&reply) {
            Ok(message_set) => message_set,
            Err(err) => {
                skip_client(&client, flow, phase, "full stage", &err);
                continue;
            }
        };

        apply(flow, phase, &client, message_set);
    }
}

/// One request/await-reply round trip with a single client
///
/// On send failure or timeout the waiter is abandoned, never resolved, so a
/// late reply cannot leak into a later transaction.
async fn transact(
    correlator: &Correlator,
    client: &ClientHandle,
    frame: Value,
    reply_timeout: Duration,
) -> Result<Value> {
    let (transaction_id, reply) = correlator.begin().await;

    if let Err(err) = correlator.send(client, &transaction_id, frame) {
        correlator.abandon(&transaction_id).await;
        return Err(err);
    }

    match timeout(reply_timeout, reply.recv()).await {
        Ok(result) => result,
        Err(_) => {
            correlator.abandon(&transaction_id).await;
            Err(RelayError::ReplyTimeout(reply_timeout))
        }
    }
}

/// Land a client's accepted replacements on the flow
///
/// A response replacement is only honored once the flow actually has a
/// response; during the request phase it is ignored with a warning rather
/// than conjuring a response out of nothing.
fn apply(flow: &mut Flow, phase: Phase, client: &ClientHandle, message_set: MessageSet) {
    if let Some(request) = message_set.request {
        debug!(
            connection_id = %client.connection_id(),
            flow_id = %flow.id,
            "client replaced the request"
        );
        flow.request = request;
    }
    if let Some(response) = message_set.response {
        if flow.response.is_some() {
            debug!(
                connection_id = %client.connection_id(),
                flow_id = %flow.id,
                "client replaced the response"
            );
            flow.response = Some(response);
        } else {
            warn!(
                connection_id = %client.connection_id(),
                flow_id = %flow.id,
                phase = %phase,
                "ignoring response replacement for a flow without a response"
            );
        }
    }
}

fn skip_client(client: &ClientHandle, flow: &Flow, phase: Phase, stage: &str, err: &RelayError) {
    debug!(
        connection_id = %client.connection_id(),
        flow_id = %flow.id,
        phase = %phase,
        stage = stage,
        error = %err,
        "skipping client for this flow"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Headers, Request, Response};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex as AsyncMutex};
    use uuid::Uuid;

    const FAST: Duration = Duration::from_secs(5);

    /// Spawn an in-process client: frames it receives are recorded and fed
    /// to `respond`; `Some(reply)` is echoed back through the correlator
    /// (with the transaction ID reattached), `None` ends the client as if it
    /// had disconnected.
    fn scripted_client<F>(
        correlator: Arc<Correlator>,
        mut respond: F,
    ) -> (Arc<ClientHandle>, Arc<AsyncMutex<Vec<Value>>>)
    where
        F: FnMut(&Value) -> Option<Value> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = Arc::new(ClientHandle::new(Uuid::new_v4(), tx));
        let connection_id = client.connection_id();
        let received = Arc::new(AsyncMutex::new(Vec::new()));
        let received_log = received.clone();

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let value: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
                let transaction_id = value["id"].as_str().unwrap().to_string();
                received_log.lock().await.push(value.clone());

                match respond(&value) {
                    Some(mut reply) => {
                        reply
                            .as_object_mut()
                            .unwrap()
                            .insert("id".to_string(), json!(transaction_id));
                        correlator.resolve(connection_id, &reply.to_string()).await;
                    }
                    None => break,
                }
            }
        });

        (client, received)
    }

    fn request_flow() -> Flow {
        Flow::new(
            "flow-1",
            Request::new(
                "GET",
                "http://example.com/a",
                Headers::new(),
                b"original".to_vec(),
            ),
        )
    }

    fn response_flow() -> Flow {
        let mut flow = request_flow();
        flow.response = Some(Response::new(200, Headers::new(), b"ok".to_vec()));
        flow
    }

    fn replacement_request(body: &str) -> Value {
        json!({
            "method": "GET",
            "url": "http://example.com/a",
            "headers": {},
            "body": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, body),
        })
    }

    #[tokio::test]
    async fn test_later_client_sees_earlier_replacement() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (first, _) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({"send_request": true}))
            } else {
                Some(json!({"request": replacement_request("rewritten")}))
            }
        });
        let (second, second_frames) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({"send_request": true}))
            } else {
                Some(json!({}))
            }
        });
        registry.register(first).await;
        registry.register(second).await;

        let mut flow = request_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Request, FAST).await;

        assert_eq!(flow.request.body, b"rewritten");
        let frames = second_frames.lock().await;
        let full = frames
            .iter()
            .find(|frame| frame["stage"] == "request")
            .expect("second client saw a full-stage frame");
        assert_eq!(
            full["request"]["body"],
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, "rewritten")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_sequence_skips_only_that_client() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (first, _) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({}))
            } else {
                Some(json!({}))
            }
        });
        // Accepts in pre-flight, then drops before the full-stage reply.
        let (second, _) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({"send_request": true}))
            } else {
                None
            }
        });
        let (third, third_frames) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({"send_request": true}))
            } else {
                Some(json!({"request": replacement_request("from-third")}))
            }
        });
        registry.register(first).await;
        registry.register(second).await;
        registry.register(third).await;

        let mut flow = request_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Request, FAST).await;

        // Third client still got its turn and its mutation landed.
        assert_eq!(flow.request.body, b"from-third");
        assert_eq!(third_frames.lock().await.len(), 2);
        // Nothing resolved the dropped client's transaction on its behalf.
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_interest_means_no_full_stage() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (client, frames) = scripted_client(correlator.clone(), |_| Some(json!({})));
        registry.register(client).await;

        let mut flow = request_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Request, FAST).await;

        let frames = frames.lock().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["stage"], "pre_request");
        assert_eq!(flow.request.body, b"original");
    }

    #[tokio::test]
    async fn test_request_phase_ignores_offered_response() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (client, _) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({"send_request": true}))
            } else {
                // A response pushed during the request phase has nowhere to go.
                Some(json!({"response": {
                    "status_code": 403,
                    "reason": "Forbidden",
                    "headers": {},
                    "body": "",
                }}))
            }
        });
        registry.register(client).await;

        let mut flow = request_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Request, FAST).await;

        assert!(flow.response.is_none());
        assert_eq!(flow.request.body, b"original");
    }

    #[tokio::test]
    async fn test_response_phase_applies_response_replacement() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (client, _) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_response" {
                Some(json!({"send_response": true}))
            } else {
                Some(json!({"response": {
                    "status_code": 500,
                    "reason": "Error",
                    "headers": {"x": ["1"]},
                    "body": "ZXJy",
                }}))
            }
        });
        registry.register(client).await;

        let mut flow = response_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Response, FAST).await;

        let response = flow.response.unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.reason, "Error");
        assert_eq!(response.body, b"err");
        assert_eq!(response.headers.get("x"), Some("1"));
        assert_eq!(flow.request.body, b"original");
    }

    #[tokio::test]
    async fn test_response_phase_without_response_is_a_noop() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (client, frames) = scripted_client(correlator.clone(), |_| Some(json!({})));
        registry.register(client).await;

        let mut flow = request_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Response, FAST).await;

        assert!(frames.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_skips_only_that_client() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        let (first, _) = scripted_client(correlator.clone(), |_| {
            Some(json!({"send_request": "yes"}))
        });
        let (second, _) = scripted_client(correlator.clone(), |frame| {
            if frame["stage"] == "pre_request" {
                Some(json!({"send_request": true}))
            } else {
                Some(json!({"request": replacement_request("still-works")}))
            }
        });
        registry.register(first).await;
        registry.register(second).await;

        let mut flow = request_flow();
        process_flow(&registry, &correlator, &mut flow, Phase::Request, FAST).await;

        assert_eq!(flow.request.body, b"still-works");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_client_times_out_and_is_skipped() {
        let correlator = Arc::new(Correlator::new());
        let registry = ClientRegistry::new();

        // Receives frames but never answers.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let silent = Arc::new(ClientHandle::new(Uuid::new_v4(), tx));
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let (talkative, frames) = scripted_client(correlator.clone(), |_| Some(json!({})));
        registry.register(silent).await;
        registry.register(talkative).await;

        let mut flow = request_flow();
        process_flow(
            &registry,
            &correlator,
            &mut flow,
            Phase::Request,
            Duration::from_millis(100),
        )
        .await;

        // The silent client's waiter was abandoned, and the next client ran.
        assert_eq!(correlator.pending_count().await, 0);
        assert_eq!(frames.lock().await.len(), 1);
    }
}
