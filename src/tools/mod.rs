//! Tool handlers for the Canvas MCP server.
//!
//! Handlers are thin glue: they extract credentials, call into
//! [`CanvasClient`](crate::canvas::CanvasClient), and shape the reply. They own
//! no session or pagination logic. Upstream failures are converted into
//! `isError: true` results here — an unknown tool name or malformed arguments
//! is the only protocol-level error a call can produce.

mod courses;
mod enrollments;
mod users;

use crate::canvas::types::KnownUserIndex;
use crate::canvas::{CanvasClient, RequestAuth};
use crate::protocol::{CallToolResult, JsonRpcError};
use serde_json::Value;
use tokio::sync::RwLock;

/// Everything a tool handler may reach: the upstream client, the raw
/// credential material of the current request, and the session's known-users
/// index.
pub struct ToolContext<'a> {
    pub client: &'a CanvasClient,
    pub auth: &'a RequestAuth,
    pub known_users: &'a RwLock<Option<KnownUserIndex>>,
}

/// Descriptors for every exposed tool, in `tools/list` order.
pub fn tool_definitions() -> Vec<Value> {
    let mut tools = Vec::new();
    tools.extend(courses::tools());
    tools.extend(users::tools());
    tools.extend(enrollments::tools());
    tools
}

/// Dispatch a `tools/call` by name.
pub async fn call(
    name: &str,
    args: Value,
    ctx: &ToolContext<'_>,
) -> Result<CallToolResult, JsonRpcError> {
    match name {
        "list_courses" => courses::list_courses(ctx).await,
        "list_users_in_course" => users::list_users_in_course(args, ctx).await,
        "refresh_known_users" => users::refresh_known_users(ctx).await,
        "get_users_info" => users::get_users_info(args, ctx).await,
        "enroll_users_in_courses" => enrollments::enroll_users_in_courses(args, ctx).await,
        "get_enrollment_progress" => enrollments::get_enrollment_progress(args, ctx).await,
        "unenroll_users" => enrollments::unenroll_users(args, ctx).await,
        _ => Err(JsonRpcError::invalid_params(format!("Unknown tool: {name}"))),
    }
}

/// Decode typed tool arguments, mapping failures to an invalid-params error.
fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(args)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid arguments: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_every_dispatchable_tool() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        for expected in [
            "list_courses",
            "list_users_in_course",
            "refresh_known_users",
            "get_users_info",
            "enroll_users_in_courses",
            "get_enrollment_progress",
            "unenroll_users",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn every_tool_has_schema_and_description() {
        for tool in tool_definitions() {
            assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }
}
