//! Error types used across `popstream`.
//!
//! Operational failures on a topic (a refused upstream connection, a remote
//! hang-up) are never returned to callers; they travel to subscribers as
//! `Error` broadcast events. The types below cover what is left: the broker
//! having stopped, and the failures an upstream endpoint reports to its
//! connection driver.

use thiserror::Error;

/// Errors returned by the broker handle and the client facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker actor has shut down and no longer accepts commands.
    #[error("broker is closed")]
    Closed,
}

/// Failures reported by a [`StreamEndpoint`](crate::upstream::StreamEndpoint).
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// WebSocket handshake or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The remote side ended the stream.
    #[error("stream closed by remote")]
    Closed,

    /// Any other endpoint-specific failure.
    #[error("endpoint error: {0}")]
    Endpoint(String),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
