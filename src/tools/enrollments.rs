//! Enrollment tools: bulk enroll, job polling, per-item unenroll.

use super::{parse_args, ToolContext};
use crate::canvas::types::EnrollmentType;
use crate::canvas::CanvasCredentials;
use crate::protocol::{CallToolResult, JsonRpcError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

pub fn tools() -> Vec<Value> {
    vec![
        json!({
            "name": "enroll_users_in_courses",
            "description": "Enroll multiple users in multiple courses via a bulk async job. \
                            Returns a Progress object; poll its ID with \
                            get_enrollment_progress until the job completes.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "user_ids": {"type": "array", "items": {"type": "integer"}},
                    "course_ids": {"type": "array", "items": {"type": "integer"}},
                    "enrollment_type": {
                        "type": "string",
                        "enum": ["StudentEnrollment", "TeacherEnrollment", "TaEnrollment",
                                 "DesignerEnrollment", "ObserverEnrollment"],
                        "description": "Defaults to StudentEnrollment"
                    }
                },
                "required": ["user_ids", "course_ids"]
            },
            "annotations": {"destructiveHint": false, "openWorldHint": true}
        }),
        json!({
            "name": "get_enrollment_progress",
            "description": "Check the status of a bulk enrollment job by its progress ID. \
                            Returns workflow_state (queued, running, completed, failed) and \
                            completion percentage.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "progress_id": {"type": "integer"}
                },
                "required": ["progress_id"]
            },
            "annotations": {"readOnlyHint": true, "openWorldHint": true}
        }),
        json!({
            "name": "unenroll_users",
            "description": "Remove enrollments from courses. Takes a list of \
                            {course_id, enrollment_id} pairs (get enrollment IDs from \
                            list_users_in_course or get_users_info). Reports successes and \
                            failures per item.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "enrollments": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "course_id": {"type": "integer"},
                                "enrollment_id": {"type": "integer"}
                            },
                            "required": ["course_id", "enrollment_id"]
                        }
                    }
                },
                "required": ["enrollments"]
            },
            "annotations": {"destructiveHint": true, "openWorldHint": true}
        }),
    ]
}

#[derive(Debug, Deserialize)]
struct EnrollArgs {
    user_ids: Vec<u64>,
    course_ids: Vec<u64>,
    #[serde(default)]
    enrollment_type: Option<EnrollmentType>,
}

pub async fn enroll_users_in_courses(
    args: Value,
    ctx: &ToolContext<'_>,
) -> Result<CallToolResult, JsonRpcError> {
    let args: EnrollArgs = parse_args(args)?;
    if args.user_ids.is_empty() || args.course_ids.is_empty() {
        return Ok(CallToolResult::error(
            "user_ids and course_ids must both be non-empty.",
        ));
    }
    let creds = match CanvasCredentials::extract(ctx.auth) {
        Ok(creds) => creds,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    let kind = args
        .enrollment_type
        .unwrap_or(EnrollmentType::StudentEnrollment);
    match ctx
        .client
        .bulk_enroll(&creds, &args.user_ids, &args.course_ids, kind)
        .await
    {
        Ok(progress) => Ok(CallToolResult::success(
            serde_json::to_string(&progress).unwrap_or_else(|_| "{}".to_string()),
        )),
        Err(e) => Ok(CallToolResult::error(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct ProgressArgs {
    progress_id: u64,
}

pub async fn get_enrollment_progress(
    args: Value,
    ctx: &ToolContext<'_>,
) -> Result<CallToolResult, JsonRpcError> {
    let args: ProgressArgs = parse_args(args)?;
    let creds = match CanvasCredentials::extract(ctx.auth) {
        Ok(creds) => creds,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    match ctx.client.get_progress(&creds, args.progress_id).await {
        Ok(progress) => Ok(CallToolResult::success(
            serde_json::to_string(&progress).unwrap_or_else(|_| "{}".to_string()),
        )),
        Err(e) => Ok(CallToolResult::error(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct UnenrollTarget {
    course_id: u64,
    enrollment_id: u64,
}

#[derive(Debug, Deserialize)]
struct UnenrollArgs {
    enrollments: Vec<UnenrollTarget>,
}

/// Deletes each enrollment in turn. One failed deletion does not abort the
/// rest; the reply lists successes next to failures, and the whole call is
/// flagged as an error only when every item failed.
pub async fn unenroll_users(
    args: Value,
    ctx: &ToolContext<'_>,
) -> Result<CallToolResult, JsonRpcError> {
    let args: UnenrollArgs = parse_args(args)?;
    if args.enrollments.is_empty() {
        return Ok(CallToolResult::error("enrollments must be non-empty."));
    }
    let creds = match CanvasCredentials::extract(ctx.auth) {
        Ok(creds) => creds,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    let mut removed: Vec<Value> = Vec::new();
    let mut failed: Vec<Value> = Vec::new();
    for target in &args.enrollments {
        match ctx
            .client
            .unenroll(&creds, target.course_id, target.enrollment_id)
            .await
        {
            Ok(()) => removed.push(json!({
                "course_id": target.course_id,
                "enrollment_id": target.enrollment_id,
            })),
            Err(e) => {
                warn!(
                    course_id = target.course_id,
                    enrollment_id = target.enrollment_id,
                    error = %e,
                    "Unenroll failed"
                );
                failed.push(json!({
                    "course_id": target.course_id,
                    "enrollment_id": target.enrollment_id,
                    "error": e.to_string(),
                }));
            }
        }
    }

    let body = json!({ "removed": removed, "failed": failed }).to_string();
    if removed.is_empty() {
        Ok(CallToolResult::error(body))
    } else {
        Ok(CallToolResult::success(body))
    }
}
