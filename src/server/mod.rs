//! MCP server core: JSON-RPC method handling for one session.

pub mod dispatcher;

use crate::canvas::types::KnownUserIndex;
use crate::canvas::{CanvasClient, RequestAuth};
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::tools::{self, ToolContext};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// MCP protocol revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Per-session MCP server: answers JSON-RPC methods and dispatches tool calls.
///
/// The known-users index lives here, so its lifetime is exactly the session's.
pub struct McpServer {
    client: Arc<CanvasClient>,
    known_users: RwLock<Option<KnownUserIndex>>,
}

impl McpServer {
    pub fn new(client: Arc<CanvasClient>) -> Self {
        Self {
            client,
            known_users: RwLock::new(None),
        }
    }

    fn instructions() -> &'static str {
        "Canvas LMS administration server. \
         \n\nWorkflow: \
         \n1. list_courses: Get course IDs and names. \
         \n2. list_users_in_course: Get users with their enrollment IDs and roles. \
         \n3. enroll_users_in_courses / unenroll_users: Manage enrollments. \
         \n4. get_enrollment_progress: Poll bulk enrollment jobs until completed. \
         \n\nFor email-based lookups, call refresh_known_users once to index all \
         users, then get_users_info with the emails you need. \
         \n\nCredentials come from the 'authorization' and 'x-canvas-domain' \
         request headers, or CANVAS_TOKEN and CANVAS_DOMAIN on the server."
    }

    /// Handle one JSON-RPC message. Notifications return `None`.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        auth: &RequestAuth,
    ) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "Ignoring notification");
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        let result = match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "canvas-mcp",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "instructions": Self::instructions(),
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::tool_definitions() })),
            "tools/call" => self.call_tool(request.params, auth).await,
            method => Err(JsonRpcError::method_not_found(method)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn call_tool(
        &self,
        params: Option<Value>,
        auth: &RequestAuth,
    ) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;
        let args = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let ctx = ToolContext {
            client: &self.client,
            auth,
            known_users: &self.known_users,
        };
        let result = tools::call(name, args, &ctx).await?;
        serde_json::to_value(result)
            .map_err(|e| JsonRpcError::new(crate::protocol::INTERNAL_ERROR, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RequestAuth;

    fn server() -> McpServer {
        McpServer::new(Arc::new(CanvasClient::new()))
    }

    fn auth() -> RequestAuth {
        RequestAuth {
            token: Some("Bearer test".into()),
            domain: Some("https://canvas.example.edu".into()),
            no_admin: false,
        }
    }

    fn request(raw: &str) -> JsonRpcRequest {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_server_info() {
        let resp = server()
            .handle_request(
                request(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#),
                &auth(),
            )
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "canvas-mcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_exposes_all_tools() {
        let resp = server()
            .handle_request(
                request(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#),
                &auth(),
            )
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 7);
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let resp = server()
            .handle_request(
                request(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#),
                &auth(),
            )
            .await
            .unwrap();
        let error = resp.error.unwrap();
        assert_eq!(error.code, crate::protocol::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notification_produces_no_reply() {
        let resp = server()
            .handle_request(
                request(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
                &auth(),
            )
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn tool_call_without_name_is_invalid_params() {
        let resp = server()
            .handle_request(
                request(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{}}"#),
                &auth(),
            )
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, crate::protocol::INVALID_PARAMS);
    }
}
