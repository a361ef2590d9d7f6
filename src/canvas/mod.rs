//! Upstream Canvas LMS integration: credentials, typed models, and the
//! pagination-aware HTTP client.

pub mod client;
pub mod credentials;
pub mod types;

pub use client::{CanvasClient, UserQuery};
pub use credentials::{CanvasCredentials, RequestAuth};
