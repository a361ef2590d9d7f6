//! Per-request Canvas credential extraction.
//!
//! Credentials arrive on every HTTP request via the `authorization` and
//! `x-canvas-domain` headers, with `CANVAS_TOKEN` / `CANVAS_DOMAIN` env vars as
//! fallback for non-interactive deployments. They are never persisted and never
//! logged.
//!
//! Truthiness rule (kept exactly as upstream callers depend on it): the env
//! fallback applies only when a header is absent, but a present-but-empty
//! value - from either source - still counts as missing. The
//! `x-canvas-no-admin` flag is boolean-by-presence.

use crate::error::CanvasError;
use hyper::http::HeaderMap;
use std::env;

/// Raw credential material captured from one inbound request's headers.
///
/// Extraction into a validated [`CanvasCredentials`] is deferred to the tool
/// handler so that requests which never touch Canvas don't require them.
#[derive(Debug, Clone, Default)]
pub struct RequestAuth {
    pub token: Option<String>,
    pub domain: Option<String>,
    pub no_admin: bool,
}

impl RequestAuth {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            token: header("authorization"),
            domain: header("x-canvas-domain"),
            no_admin: headers.contains_key("x-canvas-no-admin"),
        }
    }
}

/// A validated (token, base-address) pair for upstream calls.
#[derive(Debug, Clone)]
pub struct CanvasCredentials {
    pub token: String,
    pub domain: String,
    /// Suppress admin-only query fields (set via `x-canvas-no-admin`).
    pub no_admin: bool,
}

impl CanvasCredentials {
    /// Resolve credentials from request headers with env fallback.
    ///
    /// Absence of either piece is a terminal, user-visible error, not a
    /// retryable one.
    pub fn extract(auth: &RequestAuth) -> Result<Self, CanvasError> {
        let token = resolve(auth.token.as_deref(), "CANVAS_TOKEN");
        let domain = resolve(auth.domain.as_deref(), "CANVAS_DOMAIN");
        match (token, domain) {
            (Some(token), Some(domain)) => Ok(Self {
                token,
                domain,
                no_admin: auth.no_admin || env_flag("CANVAS_NO_ADMIN"),
            }),
            _ => Err(CanvasError::MissingCredentials),
        }
    }
}

/// Header value if present (even empty), else env var; empty results are
/// missing either way.
fn resolve(header: Option<&str>, env_var: &str) -> Option<String> {
    let value = match header {
        Some(v) => v.to_string(),
        None => env::var(env_var).unwrap_or_default(),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn env_flag(env_var: &str) -> bool {
    env::var(env_var).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::http::HeaderValue;

    fn auth(token: Option<&str>, domain: Option<&str>) -> RequestAuth {
        RequestAuth {
            token: token.map(str::to_string),
            domain: domain.map(str::to_string),
            no_admin: false,
        }
    }

    #[test]
    fn extracts_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        headers.insert(
            "x-canvas-domain",
            HeaderValue::from_static("https://canvas.example.edu"),
        );
        headers.insert("x-canvas-no-admin", HeaderValue::from_static(""));

        let auth = RequestAuth::from_headers(&headers);
        let creds = CanvasCredentials::extract(&auth).unwrap();
        assert_eq!(creds.token, "Bearer tok");
        assert_eq!(creds.domain, "https://canvas.example.edu");
        // Presence alone sets the flag, even with an empty value.
        assert!(creds.no_admin);
    }

    #[test]
    fn missing_domain_is_terminal() {
        env::remove_var("CANVAS_DOMAIN");
        let err = CanvasCredentials::extract(&auth(Some("tok"), None)).unwrap_err();
        assert!(matches!(err, CanvasError::MissingCredentials));
        // The message names both required inputs.
        let msg = err.to_string();
        assert!(msg.contains("authorization"));
        assert!(msg.contains("x-canvas-domain"));
    }

    #[test]
    fn present_but_empty_header_counts_as_missing() {
        let err = CanvasCredentials::extract(&auth(Some(""), Some("https://c"))).unwrap_err();
        assert!(matches!(err, CanvasError::MissingCredentials));
    }
}
