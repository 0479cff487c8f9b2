//! The `transport` module is the local gateway: a WebSocket server that lets
//! separate UI contexts (browser tabs, windows) share one broker.
//!
//! Each connection gets its own client facade. The connection names its
//! subscriptions with ids of its choosing and receives every event tagged
//! with the id it belongs to.

pub mod message;
pub mod websocket;

pub use message::{ClientMessage, ServerMessage};
pub use websocket::start_websocket_server;

#[cfg(test)]
mod websocket_tests;
