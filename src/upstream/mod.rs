//! The `upstream` module owns the network side of the broker: one streaming
//! connection per topic, opened through a pluggable [`StreamEndpoint`].
//!
//! The endpoint only has to turn a topic into a stream of UTF-8 payloads.
//! [`UpstreamConnection`] drives that stream in its own task and reports
//! `Open`, `Message` and `Error` back to the broker. No retry policy lives
//! here; after an `Error` the connection is finished.

pub mod connection;
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::broker::message::Payload;
use crate::utils::UpstreamError;

pub use connection::{ConnectionId, UpstreamConnection, UpstreamEvent, UpstreamMessage};
pub use websocket::WebSocketEndpoint;

/// Stream of raw payloads produced by an endpoint.
pub type PayloadStream = BoxStream<'static, Result<String, UpstreamError>>;

/// Given a topic, produces the stream of payloads published for it.
#[async_trait]
pub trait StreamEndpoint: Send + Sync {
    /// Establishes the connection. Returning `Ok` means the stream is open.
    async fn connect(&self, topic: &str) -> Result<PayloadStream, UpstreamError>;
}

/// Decodes a payload as JSON, keeping the text verbatim when it is not valid
/// JSON.
pub fn decode_payload(text: &str) -> Payload {
    match serde_json::from_str(text) {
        Ok(value) => Payload::Json(value),
        Err(e) => {
            tracing::debug!("payload is not JSON ({e}), delivering raw text");
            Payload::Raw(text.to_string())
        }
    }
}
