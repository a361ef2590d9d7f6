//! Session lifecycle: registry, per-session transport, idle eviction.
//!
//! A session is born on a handshake POST, lives in the [`SessionRegistry`],
//! and dies by client DELETE or by the [`sweeper`] once idle past the TTL.
//! Whichever path wins, the transport is closed exactly once.

pub mod registry;
pub mod sweeper;
pub mod transport;

pub use registry::SessionRegistry;
pub use sweeper::{run_sweep, spawn_sweeper};
pub use transport::{SessionTransport, TransportReply};
