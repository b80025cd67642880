//! Event buffering and routing for the market recorder.
//!
//! Sits between the WebSocket session and the persistence sink: every decoded
//! message is routed by token id to its instrument's buffer, buffers dedup
//! repeated top-of-book state, and a periodic sweep flushes them to storage.

pub mod buffer;
pub mod dispatch;
pub mod routing;

pub use buffer::EventBuffer;
pub use dispatch::Router;
pub use routing::{RoutingEntry, RoutingTable, SharedBuffer, SharedRouting};
