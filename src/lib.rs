//! Canvas LMS MCP server.
//!
//! Exposes Canvas administration tools (course listing, user listing,
//! bulk enrollment, unenrollment, email-based user lookup) to MCP clients
//! over the streamable HTTP transport.
//!
//! Layering:
//! - [`canvas`]: typed client for the paginated Canvas REST API.
//! - [`protocol`]: JSON-RPC 2.0 message types.
//! - [`tools`]: tool handlers mapping MCP calls onto the client.
//! - [`server`]: per-session method handling and the HTTP dispatcher.
//! - [`session`]: session registry, per-session transport, idle eviction.

pub mod canvas;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;

pub use canvas::CanvasClient;
pub use error::CanvasError;
pub use server::dispatcher::{McpDispatcher, McpService};
pub use server::McpServer;
pub use session::{SessionRegistry, SessionTransport};
