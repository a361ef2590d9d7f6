//! User listing and the per-session known-users index.

use super::{parse_args, ToolContext};
use crate::canvas::types::{
    EnrollmentType, KnownUser, KnownUserEnrollment, KnownUserIndex, UserEnrollmentOutput,
    UserListOutput, UserOutput,
};
use crate::canvas::{CanvasCredentials, UserQuery};
use crate::protocol::{CallToolResult, JsonRpcError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// Upper bound on the per-session known-users index. Refreshing stops indexing
/// new users past this point; a session is not allowed to grow without limit.
const KNOWN_USERS_CAP: usize = 10_000;

pub fn tools() -> Vec<Value> {
    vec![
        json!({
            "name": "list_users_in_course",
            "description": "List all users enrolled in a Canvas course, with their enrollment \
                            IDs and roles. Each user includes enrollment_id + role pairs needed \
                            for unenrolling.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "course_id": {"type": "integer", "description": "The Canvas course ID"},
                    "enrollment_types": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["student", "teacher", "ta", "designer", "observer"]},
                        "description": "Filter by enrollment type(s)"
                    }
                },
                "required": ["course_id"]
            },
            "annotations": {"readOnlyHint": true, "openWorldHint": true}
        }),
        json!({
            "name": "refresh_known_users",
            "description": "Indexes all Canvas users across all courses into a session cache. \
                            Must be called once before using get_users_info. Caches user IDs, \
                            names, emails, and all their enrollments (enrollment IDs, course \
                            IDs, roles, states).",
            "inputSchema": {"type": "object", "properties": {}},
            "annotations": {"readOnlyHint": true}
        }),
        json!({
            "name": "get_users_info",
            "description": "Look up users by email from the session cache. Returns user IDs, \
                            names, and all their enrollments (enrollment_id, course_id, \
                            course_name, course_code, role, state). Requires \
                            refresh_known_users to have been called first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "emails": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["emails"]
            },
            "annotations": {"readOnlyHint": true}
        }),
    ]
}

/// Role filter accepted by `list_users_in_course` (short labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleFilter {
    Student,
    Teacher,
    Ta,
    Designer,
    Observer,
}

impl RoleFilter {
    fn to_enrollment_type(self) -> EnrollmentType {
        match self {
            RoleFilter::Student => EnrollmentType::StudentEnrollment,
            RoleFilter::Teacher => EnrollmentType::TeacherEnrollment,
            RoleFilter::Ta => EnrollmentType::TaEnrollment,
            RoleFilter::Designer => EnrollmentType::DesignerEnrollment,
            RoleFilter::Observer => EnrollmentType::ObserverEnrollment,
        }
    }

    fn label(self) -> &'static str {
        self.to_enrollment_type().label()
    }
}

#[derive(Debug, Deserialize)]
struct ListUsersArgs {
    course_id: u64,
    #[serde(default)]
    enrollment_types: Option<Vec<RoleFilter>>,
}

pub async fn list_users_in_course(
    args: Value,
    ctx: &ToolContext<'_>,
) -> Result<CallToolResult, JsonRpcError> {
    let args: ListUsersArgs = parse_args(args)?;
    let creds = match CanvasCredentials::extract(ctx.auth) {
        Ok(creds) => creds,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    let query = UserQuery {
        enrollment_types: args
            .enrollment_types
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|f| f.to_enrollment_type())
            .collect(),
        include: vec!["avatar_url"],
    };

    let users = match ctx
        .client
        .get_users_in_course(&creds, args.course_id, &query)
        .await
    {
        Ok(users) => users,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    let simplified: Vec<UserOutput> = users
        .iter()
        .map(|user| {
            let enrollments = user.enrollments.as_deref().unwrap_or_default();
            UserOutput {
                name: user.name.clone(),
                email: user.contact().map(str::to_string),
                avatar_url: user.avatar_url.clone(),
                html_url: enrollments.first().and_then(|e| e.html_url.clone()),
                enrollments: enrollments
                    .iter()
                    .map(|e| UserEnrollmentOutput {
                        enrollment_id: e.id,
                        role: e.kind.label().to_string(),
                    })
                    .collect(),
            }
        })
        .collect();

    let count_role = |role: &str| {
        simplified
            .iter()
            .filter(|u| u.enrollments.iter().any(|e| e.role == role))
            .count()
    };
    // Counts are reported only for the roles the caller filtered on (all of
    // them when unfiltered).
    let include: Vec<&str> = match &args.enrollment_types {
        Some(filters) => filters.iter().map(|f| f.label()).collect(),
        None => EnrollmentType::all().iter().map(|t| t.label()).collect(),
    };
    let count_if = |role: &str| include.contains(&role).then(|| count_role(role));

    let output = UserListOutput {
        student_count: count_if("student"),
        teacher_count: count_if("teacher"),
        ta_count: count_if("ta"),
        designer_count: count_if("designer"),
        observer_count: count_if("observer"),
        users: simplified,
    };

    Ok(CallToolResult::success(
        serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string()),
    ))
}

pub async fn refresh_known_users(ctx: &ToolContext<'_>) -> Result<CallToolResult, JsonRpcError> {
    let creds = match CanvasCredentials::extract(ctx.auth) {
        Ok(creds) => creds,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    let courses = match ctx.client.get_courses(&creds).await {
        Ok(courses) => courses,
        Err(e) => return Ok(CallToolResult::error(e.to_string())),
    };

    let mut index: KnownUserIndex = KnownUserIndex::new();
    let mut capped = false;
    let query = UserQuery {
        enrollment_types: Vec::new(),
        include: vec!["email"],
    };

    for course in &courses {
        let users = match ctx
            .client
            .get_users_in_course(&creds, course.id, &query)
            .await
        {
            Ok(users) => users,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };

        for user in users {
            let Some(email) = user.contact().map(str::to_lowercase) else {
                continue;
            };
            let new_enrollments: Vec<KnownUserEnrollment> = user
                .enrollments
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|e| KnownUserEnrollment {
                    enrollment_id: e.id,
                    course_id: e.course_id,
                    course_name: course.name.clone(),
                    course_code: course.course_code.clone(),
                    role: e.kind.label().to_string(),
                    state: e.enrollment_state,
                })
                .collect();

            if let Some(existing) = index.get_mut(&email) {
                existing.enrollments.extend(new_enrollments);
            } else if index.len() < KNOWN_USERS_CAP {
                index.insert(
                    email.clone(),
                    KnownUser {
                        id: user.id,
                        name: user.name,
                        email,
                        enrollments: new_enrollments,
                    },
                );
            } else {
                capped = true;
            }
        }
    }

    let indexed = index.len();
    *ctx.known_users.write().await = Some(index);
    info!(users = indexed, courses = courses.len(), "Refreshed known-users index");

    let mut message = format!(
        "Indexed {indexed} unique users across {} courses.",
        courses.len()
    );
    if capped {
        message.push_str(&format!(" Index capped at {KNOWN_USERS_CAP} users."));
    }
    Ok(CallToolResult::success(message))
}

#[derive(Debug, Deserialize)]
struct GetUsersInfoArgs {
    emails: Vec<String>,
}

pub async fn get_users_info(
    args: Value,
    ctx: &ToolContext<'_>,
) -> Result<CallToolResult, JsonRpcError> {
    let args: GetUsersInfoArgs = parse_args(args)?;

    let index = ctx.known_users.read().await;
    let Some(index) = index.as_ref() else {
        return Ok(CallToolResult::error(
            "Call refresh_known_users before using this tool.",
        ));
    };

    let mut found: Vec<&KnownUser> = Vec::new();
    let mut not_found: Vec<&str> = Vec::new();
    for email in &args.emails {
        match index.get(&email.to_lowercase()) {
            Some(user) => found.push(user),
            None => not_found.push(email),
        }
    }

    let body = json!({ "found": found, "notFound": not_found });
    Ok(CallToolResult::success(body.to_string()))
}
