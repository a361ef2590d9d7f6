//! Per-session protocol transport.
//!
//! One `SessionTransport` exists per live session. It owns the session's
//! [`McpServer`] state and serializes protocol handling: two HTTP requests
//! racing into the same session are processed one at a time, in arrival order
//! at the gate. Closing is exactly-once; the losing side of a concurrent
//! double-close observes a no-op.

use crate::canvas::{CanvasClient, RequestAuth};
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST};
use crate::server::McpServer;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of feeding one HTTP body to a transport.
#[derive(Debug)]
pub enum TransportReply {
    /// Only notifications were received; there is nothing to send back
    /// (HTTP 202 at the dispatcher).
    Accepted,
    /// A JSON-RPC response (or batch of responses) to relay verbatim.
    Json(Value),
}

pub struct SessionTransport {
    server: McpServer,
    gate: Mutex<()>,
    closed: AtomicBool,
}

impl SessionTransport {
    pub fn new(client: Arc<CanvasClient>) -> Self {
        Self {
            server: McpServer::new(client),
            gate: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Process one decoded HTTP body (a single message or a batch).
    ///
    /// A message that fails to decode as a request is answered with an
    /// invalid-request error rather than poisoning the rest of the batch.
    pub async fn handle(&self, payload: Value, auth: &RequestAuth) -> TransportReply {
        let _serialized = self.gate.lock().await;

        match payload {
            Value::Array(batch) => {
                let mut responses = Vec::new();
                for message in batch {
                    if let Some(response) = self.handle_one(message, auth).await {
                        responses.push(response);
                    }
                }
                if responses.is_empty() {
                    TransportReply::Accepted
                } else {
                    // Encoding of our own response types cannot fail.
                    TransportReply::Json(serde_json::to_value(responses).unwrap_or(Value::Null))
                }
            }
            single => match self.handle_one(single, auth).await {
                Some(response) => {
                    TransportReply::Json(serde_json::to_value(response).unwrap_or(Value::Null))
                }
                None => TransportReply::Accepted,
            },
        }
    }

    async fn handle_one(&self, message: Value, auth: &RequestAuth) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(INVALID_REQUEST, "Invalid Request"),
                ));
            }
        };
        self.server.handle_request(request, auth).await
    }

    /// Mark the transport closed. Returns true for the caller that actually
    /// performed the transition; later calls are no-ops.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
