//! HTTP dispatch for the streamable MCP endpoint.
//!
//! All traffic arrives on `/mcp`. The dispatcher owns the session lifecycle:
//! a handshake (initialize) request without a session id creates a transport
//! and registers it; every other request is routed by its `mcp-session-id`
//! header. Protocol-level violations are HTTP 400s; tool and upstream failures
//! are not, they travel back inside successful protocol replies.

use crate::canvas::{CanvasClient, RequestAuth};
use crate::protocol::is_initialize_request;
use crate::session::{SessionRegistry, SessionTransport, TransportReply};
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::http::{header, Method, Request, Response, StatusCode};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tower_service::Service;
use tracing::{info, warn};

/// Header carrying the opaque session id on every non-handshake request.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// 400 body for a request that needs a session but presented no usable id.
const NO_SESSION_BODY: &str = r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"Bad Request: No valid session ID provided"},"id":null}"#;
/// 400 body for an unparseable request payload.
const PARSE_ERROR_BODY: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error"},"id":null}"#;
/// 400 plain-text body for a presented-but-unknown session id. Clients react
/// by re-handshaking.
const UNKNOWN_SESSION_BODY: &str = "Invalid or missing session ID";

/// Routes HTTP requests to per-session transports.
pub struct McpDispatcher {
    registry: Arc<SessionRegistry>,
    client: Arc<CanvasClient>,
}

impl McpDispatcher {
    pub fn new(registry: Arc<SessionRegistry>, client: Arc<CanvasClient>) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle one HTTP request end to end.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<BoxBody<Bytes, Infallible>>
    where
        B: http_body::Body + Send,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let session_id = req
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let auth = RequestAuth::from_headers(req.headers());

        let (label, response) = if path != "/mcp" {
            ("not-found".to_string(), text(StatusCode::NOT_FOUND, "Not Found"))
        } else {
            match method {
                Method::POST => self.handle_post(req, session_id.as_deref(), &auth).await,
                Method::GET => ("sse-connect".to_string(), self.handle_get(session_id.as_deref()).await),
                Method::DELETE => ("session-close".to_string(), self.handle_delete(session_id.as_deref()).await),
                _ => (
                    "unsupported".to_string(),
                    text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
                ),
            }
        };

        info!(
            session = session_display(session_id.as_deref()),
            method = %label,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Handled request"
        );
        response
    }

    async fn handle_post<B>(
        &self,
        req: Request<B>,
        session_id: Option<&str>,
        auth: &RequestAuth,
    ) -> (String, Response<BoxBody<Bytes, Infallible>>)
    where
        B: http_body::Body + Send,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return ("read-error".to_string(), text(StatusCode::BAD_REQUEST, "Bad Request"));
            }
        };
        let payload: Value = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(_) => {
                return (
                    "parse-error".to_string(),
                    json_text(StatusCode::BAD_REQUEST, PARSE_ERROR_BODY),
                );
            }
        };
        let label = method_label(&payload);

        match session_id {
            Some(id) => match self.registry.get(id).await {
                Some(transport) => {
                    self.registry.touch(id).await;
                    (label, relay(transport.handle(payload, auth).await, None))
                }
                None => (label, text(StatusCode::BAD_REQUEST, UNKNOWN_SESSION_BODY)),
            },
            None if is_initialize_request(&payload) => {
                let transport = Arc::new(SessionTransport::new(self.client.clone()));
                let id = self.registry.create(transport.clone()).await;
                info!(session = %&id[..8], "Session created");
                let reply = transport.handle(payload, auth).await;
                (label, relay(reply, Some(&id)))
            }
            None => (label, json_text(StatusCode::BAD_REQUEST, NO_SESSION_BODY)),
        }
    }

    /// Server-initiated stream endpoint. The session must exist; the stream
    /// itself opens and completes immediately since this server never pushes.
    async fn handle_get(&self, session_id: Option<&str>) -> Response<BoxBody<Bytes, Infallible>> {
        let known = match session_id {
            Some(id) => self.registry.touch(id).await,
            None => false,
        };
        if known {
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Empty::<Bytes>::new().boxed())
                .expect("valid response")
        } else {
            text(StatusCode::BAD_REQUEST, UNKNOWN_SESSION_BODY)
        }
    }

    async fn handle_delete(&self, session_id: Option<&str>) -> Response<BoxBody<Bytes, Infallible>> {
        match session_id {
            Some(id) => match self.registry.remove(id).await {
                Some(transport) => {
                    transport.close();
                    info!(session = %&id[..id.len().min(8)], "Session closed by client");
                    Response::builder()
                        .status(StatusCode::OK)
                        .body(Empty::<Bytes>::new().boxed())
                        .expect("valid response")
                }
                None => text(StatusCode::BAD_REQUEST, UNKNOWN_SESSION_BODY),
            },
            None => text(StatusCode::BAD_REQUEST, UNKNOWN_SESSION_BODY),
        }
    }
}

/// Convert a transport reply into the HTTP response, attaching the session id
/// header on handshake replies.
fn relay(reply: TransportReply, new_session_id: Option<&str>) -> Response<BoxBody<Bytes, Infallible>> {
    let mut builder = match &reply {
        TransportReply::Accepted => Response::builder().status(StatusCode::ACCEPTED),
        TransportReply::Json(_) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json"),
    };
    if let Some(id) = new_session_id {
        builder = builder.header(SESSION_ID_HEADER, id);
    }
    let body = match reply {
        TransportReply::Accepted => Empty::<Bytes>::new().boxed(),
        TransportReply::Json(value) => Full::new(Bytes::from(value.to_string())).boxed(),
    };
    builder.body(body).expect("valid response")
}

fn text(status: StatusCode, body: &'static str) -> Response<BoxBody<Bytes, Infallible>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(body)).boxed())
        .expect("valid response")
}

fn json_text(status: StatusCode, body: &'static str) -> Response<BoxBody<Bytes, Infallible>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)).boxed())
        .expect("valid response")
}

/// Short log label for the payload: `method`, `tools/call(name)`, or
/// `batch[n]`.
fn method_label(payload: &Value) -> String {
    match payload {
        Value::Array(batch) => format!("batch[{}]", batch.len()),
        single => {
            let method = single.get("method").and_then(Value::as_str).unwrap_or("?");
            if method == "tools/call" {
                let tool = single
                    .pointer("/params/name")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                format!("{method}({tool})")
            } else {
                method.to_string()
            }
        }
    }
}

fn session_display(session_id: Option<&str>) -> String {
    match session_id {
        Some(id) => id[..id.len().min(8)].to_string(),
        None => "new".to_string(),
    }
}

/// Cloneable tower service wrapping the dispatcher, one clone per connection.
#[derive(Clone)]
pub struct McpService {
    dispatcher: Arc<McpDispatcher>,
}

impl McpService {
    pub fn new(dispatcher: Arc<McpDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl<B> Service<Request<B>> for McpService
where
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        Box::pin(async move { Ok(dispatcher.handle(req).await) })
    }
}
