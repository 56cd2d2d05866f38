//! Real-time session channel: registry of connected sessions, the wire
//! protocol, and the WebSocket handler that relays calls and change events.

pub mod protocol;
pub mod registry;
pub mod ws;

pub use protocol::{Request, Response};
pub use registry::SessionRegistry;
