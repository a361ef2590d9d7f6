//! Error types for the Canvas MCP server.
//!
//! Upstream (Canvas API) failures are classified into distinct variants so tool
//! handlers can tell a misconfigured domain apart from an HTTP-level rejection
//! or a contract change in the response shape. Handlers convert these into
//! `isError: true` tool results; they never escape to the transport layer.

use thiserror::Error;

/// Failures surfaced by the Canvas client and credential extraction.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The upstream host could not be reached at all (DNS, connection refused,
    /// timeout). Usually a wrong `x-canvas-domain`, not a transient condition,
    /// so it is surfaced immediately without retry.
    #[error("Could not reach {domain}, are you sure this is the right domain?")]
    Unreachable { domain: String },

    /// Canvas answered with a non-success HTTP status. Pagination is only
    /// meaningful on success, so the fetch aborts here.
    #[error("Canvas API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response decoded as JSON but did not match the expected shape.
    #[error("Unexpected Canvas response shape: {0}")]
    Validation(String),

    /// No usable credential pair. Names both required inputs so the caller can
    /// self-correct.
    #[error("Missing credentials or domain. Provide headers 'authorization' and 'x-canvas-domain', or set CANVAS_TOKEN and CANVAS_DOMAIN env vars.")]
    MissingCredentials,
}

impl CanvasError {
    /// HTTP status carried by an `Api` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CanvasError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
