//! HTTP surface: health, on-demand analytics, the WebSocket session channel,
//! and static serving of uploaded project assets.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
