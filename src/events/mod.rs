//! Document-change events and the in-process broadcast bus.

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::{BoardEvent, Broadcast};
