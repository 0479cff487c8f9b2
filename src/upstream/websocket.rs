//! WebSocket stream endpoint.
//!
//! Each topic maps to `{base_url}/{topic}`. Text frames are payloads, binary
//! frames are decoded as lossy UTF-8 and control frames are skipped.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message as WsMessage;

use crate::upstream::{PayloadStream, StreamEndpoint};
use crate::utils::UpstreamError;

#[derive(Debug, Clone)]
pub struct WebSocketEndpoint {
    base_url: String,
}

impl WebSocketEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// URL opened for `topic`.
    pub fn url_for(&self, topic: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            topic.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl StreamEndpoint for WebSocketEndpoint {
    async fn connect(&self, topic: &str) -> Result<PayloadStream, UpstreamError> {
        let url = self.url_for(topic);
        let (ws_stream, _response) = connect_async(url.as_str()).await?;
        tracing::debug!("websocket upstream connected to {url}");

        let frames = ws_stream.filter_map(|frame| async move {
            match frame {
                Ok(WsMessage::Text(text)) => Some(Ok(text.to_string())),
                Ok(WsMessage::Binary(bytes)) => {
                    Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(UpstreamError::from(e))),
            }
        });

        Ok(Box::pin(frames))
    }
}
