//! Typed models for the Canvas REST API.
//!
//! The structs mirror the documented Canvas payloads closely enough that a
//! contract change on the upstream side fails typed decoding (and is reported
//! as a validation error) instead of silently producing garbage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A Canvas course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    pub uuid: String,
    pub name: String,
    pub course_code: String,
    pub workflow_state: CourseWorkflowState,
    pub created_at: String,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub default_view: CourseView,
    pub enrollment_term_id: u64,
    pub is_public: Option<bool>,
    pub grading_standard_id: Option<i64>,
    pub license: Option<String>,
    pub grade_passback_setting: Option<String>,
    pub course_color: Option<String>,
    pub time_zone: Option<String>,
    #[serde(default)]
    pub blueprint: Option<bool>,
    #[serde(default)]
    pub template: Option<bool>,
    /// Present only when requested via `include[]=total_students`.
    #[serde(default)]
    pub total_students: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseWorkflowState {
    Unpublished,
    Available,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseView {
    Feed,
    Wiki,
    Modules,
    Assignments,
    Syllabus,
}

/// A Canvas user, optionally carrying enrollments when requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub short_name: String,
    pub sortable_name: String,
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub enrollments: Option<Vec<Enrollment>>,
}

impl User {
    /// Preferred contact address: email, falling back to login id.
    pub fn contact(&self) -> Option<&str> {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .or(self.login_id.as_deref())
    }
}

/// One enrollment of a user in a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: u64,
    pub course_id: u64,
    #[serde(rename = "type")]
    pub kind: EnrollmentType,
    pub enrollment_state: EnrollmentState,
    pub role: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnrollmentType {
    StudentEnrollment,
    TeacherEnrollment,
    TaEnrollment,
    DesignerEnrollment,
    ObserverEnrollment,
}

impl EnrollmentType {
    /// Short role label used in tool output ("student", "teacher", ...).
    pub fn label(self) -> &'static str {
        match self {
            EnrollmentType::StudentEnrollment => "student",
            EnrollmentType::TeacherEnrollment => "teacher",
            EnrollmentType::TaEnrollment => "ta",
            EnrollmentType::DesignerEnrollment => "designer",
            EnrollmentType::ObserverEnrollment => "observer",
        }
    }

    pub fn all() -> &'static [EnrollmentType] {
        &[
            EnrollmentType::StudentEnrollment,
            EnrollmentType::TeacherEnrollment,
            EnrollmentType::TaEnrollment,
            EnrollmentType::DesignerEnrollment,
            EnrollmentType::ObserverEnrollment,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Active,
    Invited,
    Inactive,
    Completed,
    Deleted,
    CreationPending,
}

/// Progress of an asynchronous Canvas job (e.g. a bulk enrollment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub id: u64,
    pub completion: Option<f64>,
    pub workflow_state: ProgressState,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Per-user entry in `list_users_in_course` output.
#[derive(Debug, Serialize)]
pub struct UserOutput {
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    pub enrollments: Vec<UserEnrollmentOutput>,
}

#[derive(Debug, Serialize)]
pub struct UserEnrollmentOutput {
    pub enrollment_id: u64,
    pub role: String,
}

/// Aggregated `list_users_in_course` output with per-role counts.
///
/// Counts are emitted only for roles the caller asked about.
#[derive(Debug, Serialize)]
pub struct UserListOutput {
    pub users: Vec<UserOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ta_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designer_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observer_count: Option<usize>,
}

/// One indexed user in the per-session known-users cache.
#[derive(Debug, Clone, Serialize)]
pub struct KnownUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub enrollments: Vec<KnownUserEnrollment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnownUserEnrollment {
    pub enrollment_id: u64,
    pub course_id: u64,
    pub course_name: String,
    pub course_code: String,
    pub role: String,
    pub state: EnrollmentState,
}

/// Session-scoped index of users keyed by lowercased email.
pub type KnownUserIndex = HashMap<String, KnownUser>;
