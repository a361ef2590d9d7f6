//! Course tools.

use super::ToolContext;
use crate::canvas::CanvasCredentials;
use crate::protocol::{CallToolResult, JsonRpcError};
use serde_json::{json, Value};

pub fn tools() -> Vec<Value> {
    vec![json!({
        "name": "list_courses",
        "description": "List all courses in Canvas LMS. Returns course IDs, names, codes, \
                        states, and student counts. Use this to get course IDs and names \
                        before enrolling or unenrolling users.",
        "inputSchema": {"type": "object", "properties": {}},
        "annotations": {"readOnlyHint": true, "openWorldHint": true}
    })]
}

pub async fn list_courses(ctx: &ToolContext<'_>) -> Result<CallToolResult, JsonRpcError> {
    let creds = match CanvasCredentials::extract(ctx.auth) {
        Ok(creds) => creds,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    match ctx.client.get_courses(&creds).await {
        Ok(courses) => Ok(CallToolResult::success(
            serde_json::to_string(&courses).unwrap_or_else(|_| "[]".to_string()),
        )),
        Err(e) => Ok(CallToolResult::error(e.to_string())),
    }
}
