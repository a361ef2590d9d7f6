//! HTTP client for the Canvas REST API.
//!
//! GET endpoints are cursor-linked: Canvas returns at most `per_page` items and
//! points at the next page through the `Link: <url>; rel="next"` header.
//! [`CanvasClient::fetch_all`] follows that chain until exhausted and returns
//! the aggregated collection. Write operations (bulk enrollment, job polling,
//! unenrollment) are single-shot but share the same request core and failure
//! classification.

use crate::canvas::credentials::CanvasCredentials;
use crate::canvas::types::{Course, EnrollmentType, Progress, User};
use crate::error::CanvasError;
use reqwest::{Client, Method, Response, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Page-size hint sent on every paginated request (Canvas maximum), to
/// minimize round trips against the rate limit.
const PER_PAGE: &str = "100";
/// Timeout for HTTP requests to Canvas.
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Optional query knobs for `GET /courses/{id}/users`.
#[derive(Debug, Default)]
pub struct UserQuery {
    /// `enrollment_type[]` filters, one per entry.
    pub enrollment_types: Vec<EnrollmentType>,
    /// Extra `include[]` values beyond `enrollments`.
    pub include: Vec<&'static str>,
}

/// Client for a Canvas LMS instance. Credentials are passed per call; the
/// client itself holds only the connection pool.
pub struct CanvasClient {
    http: Client,
}

impl CanvasClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Core request primitive: sends one request, classifies transport-level
    /// failures as `Unreachable` and non-success statuses as `Api`.
    async fn request(
        &self,
        creds: &CanvasCredentials,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, CanvasError> {
        let mut request = self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, &creds.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|_| CanvasError::Unreachable {
            domain: creds.domain.clone(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CanvasError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Build `{domain}/api/v1{path}` with the given query parameters.
    fn api_url(
        creds: &CanvasCredentials,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Url, CanvasError> {
        let base = format!("{}/api/v1{}", creds.domain, path);
        Url::parse_with_params(&base, params).map_err(|_| CanvasError::Unreachable {
            domain: creds.domain.clone(),
        })
    }

    /// GET a paginated endpoint, following `rel="next"` links until all pages
    /// are fetched. A single-object response counts as a one-element page.
    pub async fn fetch_all(
        &self,
        creds: &CanvasCredentials,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Value>, CanvasError> {
        let mut query: Vec<(&str, String)> = vec![("per_page", PER_PAGE.to_string())];
        query.extend(params.iter().cloned());
        let first = Self::api_url(creds, path, &query)?;

        let mut results = Vec::new();
        let mut next = Some(first.to_string());
        let mut pages = 0usize;

        while let Some(url) = next {
            let url = Url::parse(&url).map_err(|_| CanvasError::Unreachable {
                domain: creds.domain.clone(),
            })?;
            let response = self.request(creds, Method::GET, url, None).await?;
            // The continuation pointer already encodes all prior query state;
            // it is followed verbatim.
            next = next_page_url(&response);

            let data: Value = response
                .json()
                .await
                .map_err(|e| CanvasError::Validation(e.to_string()))?;
            match data {
                Value::Array(items) => results.extend(items),
                single => results.push(single),
            }
            pages += 1;
        }

        debug!(path, pages, items = results.len(), "Fetched paginated endpoint");
        Ok(results)
    }

    /// Single-shot GET returning one typed object.
    async fn get_one<T: serde::de::DeserializeOwned>(
        &self,
        creds: &CanvasCredentials,
        path: &str,
    ) -> Result<T, CanvasError> {
        let url = Self::api_url(creds, path, &[])?;
        let response = self.request(creds, Method::GET, url, None).await?;
        response
            .json()
            .await
            .map_err(|e| CanvasError::Validation(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(items: Vec<Value>) -> Result<T, CanvasError> {
        serde_json::from_value(Value::Array(items))
            .map_err(|e| CanvasError::Validation(e.to_string()))
    }

    /// All courses visible to the caller, with student totals.
    pub async fn get_courses(
        &self,
        creds: &CanvasCredentials,
    ) -> Result<Vec<Course>, CanvasError> {
        let data = self
            .fetch_all(creds, "/courses", &[("include[]", "total_students".to_string())])
            .await?;
        Self::decode(data)
    }

    /// Users enrolled in a course, with their enrollments attached.
    ///
    /// The `email` include is admin-only upstream and is skipped when the
    /// caller set the no-admin flag.
    pub async fn get_users_in_course(
        &self,
        creds: &CanvasCredentials,
        course_id: u64,
        query: &UserQuery,
    ) -> Result<Vec<User>, CanvasError> {
        let mut params: Vec<(&str, String)> = vec![("include[]", "enrollments".to_string())];
        for include in &query.include {
            if *include == "email" && creds.no_admin {
                continue;
            }
            params.push(("include[]", include.to_string()));
        }
        for kind in &query.enrollment_types {
            params.push(("enrollment_type[]", kind.label().to_string()));
        }

        let path = format!("/courses/{course_id}/users");
        let data = self.fetch_all(creds, &path, &params).await?;
        Self::decode(data)
    }

    /// Submit a bulk enrollment job. Returns the Progress object tracking it.
    pub async fn bulk_enroll(
        &self,
        creds: &CanvasCredentials,
        user_ids: &[u64],
        course_ids: &[u64],
        enrollment_type: EnrollmentType,
    ) -> Result<Progress, CanvasError> {
        let url = Self::api_url(creds, "/accounts/self/bulk_enrollment", &[])?;
        let body = json!({
            "user_ids": user_ids,
            "course_ids": course_ids,
            "enrollment_type": enrollment_type,
        });
        let response = self.request(creds, Method::POST, url, Some(&body)).await?;
        response
            .json()
            .await
            .map_err(|e| CanvasError::Validation(e.to_string()))
    }

    /// Poll an async job by its progress id.
    pub async fn get_progress(
        &self,
        creds: &CanvasCredentials,
        progress_id: u64,
    ) -> Result<Progress, CanvasError> {
        self.get_one(creds, &format!("/progress/{progress_id}")).await
    }

    /// Delete one enrollment (`task=delete`). Single-shot; callers doing bulk
    /// unenrollment collect per-item failures themselves.
    pub async fn unenroll(
        &self,
        creds: &CanvasCredentials,
        course_id: u64,
        enrollment_id: u64,
    ) -> Result<(), CanvasError> {
        let path = format!("/courses/{course_id}/enrollments/{enrollment_id}");
        let url = Self::api_url(creds, &path, &[("task", "delete".to_string())])?;
        self.request(creds, Method::DELETE, url, None).await?;
        Ok(())
    }
}

impl Default for CanvasClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the `rel="next"` target from a response's `Link` header, if any.
fn next_page_url(response: &Response) -> Option<String> {
    let link = response.headers().get(reqwest::header::LINK)?.to_str().ok()?;
    parse_next_link(link)
}

/// Parse an RFC 5988 `Link` header and return the `rel="next"` URL.
fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments
            .any(|param| matches!(param.trim(), "rel=\"next\"" | "rel=next"));
        if is_next {
            return target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_link_among_multiple_rels() {
        let header = "<https://c.example/api/v1/courses?page=2&per_page=100>; rel=\"current\", \
                      <https://c.example/api/v1/courses?page=3&per_page=100>; rel=\"next\", \
                      <https://c.example/api/v1/courses?page=1&per_page=100>; rel=\"first\"";
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://c.example/api/v1/courses?page=3&per_page=100")
        );
    }

    #[test]
    fn no_next_link_means_last_page() {
        let header = "<https://c.example/api/v1/courses?page=3>; rel=\"current\", \
                      <https://c.example/api/v1/courses?page=1>; rel=\"first\"";
        assert_eq!(parse_next_link(header), None);
    }

    #[test]
    fn api_url_includes_per_page_free_params() {
        let creds = CanvasCredentials {
            token: "t".into(),
            domain: "https://canvas.example.edu".into(),
            no_admin: false,
        };
        let url = CanvasClient::api_url(
            &creds,
            "/courses/7/users",
            &[("include[]", "enrollments".to_string())],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://canvas.example.edu/api/v1/courses/7/users?include%5B%5D=enrollments"
        );
    }

    #[test]
    fn bogus_domain_is_classified_unreachable() {
        let creds = CanvasCredentials {
            token: "t".into(),
            domain: "not a url".into(),
            no_admin: false,
        };
        let err = CanvasClient::api_url(&creds, "/courses", &[]).unwrap_err();
        assert!(matches!(err, CanvasError::Unreachable { .. }));
    }
}
