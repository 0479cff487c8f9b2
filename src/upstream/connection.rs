//! A single upstream connection for a single topic.
//!
//! `UpstreamConnection::open` spawns a driver task that connects through the
//! endpoint and forwards everything it sees to the broker as
//! [`UpstreamMessage`]s, tagged with the connection id. The broker uses the
//! id to drop late events from a connection it has already released.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broker::message::Payload;
use crate::upstream::{StreamEndpoint, decode_payload};
use crate::utils::UpstreamError;

/// Broker-unique identifier of one upstream connection.
pub type ConnectionId = u64;

/// Lifecycle events surfaced by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Open,
    Message(Payload),
    Error(String),
}

/// An upstream event addressed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamMessage {
    pub topic: String,
    pub connection_id: ConnectionId,
    pub event: UpstreamEvent,
}

/// Handle to a running upstream connection. Dropping it releases the
/// connection.
#[derive(Debug)]
pub struct UpstreamConnection {
    id: ConnectionId,
    topic: String,
    task: JoinHandle<()>,
}

impl UpstreamConnection {
    /// Starts connecting to `topic`. Must be called inside a tokio runtime.
    pub fn open(
        id: ConnectionId,
        topic: &str,
        endpoint: Arc<dyn StreamEndpoint>,
        events: UnboundedSender<UpstreamMessage>,
    ) -> Self {
        info!("opening upstream connection {id} for topic {topic}");
        let task = tokio::spawn(drive(id, topic.to_string(), endpoint, events));
        Self {
            id,
            topic: topic.to_string(),
            task,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Closes the connection. Events already queued for the broker may still
    /// arrive and are recognised by their stale id.
    pub fn close(self) {
        info!("closing upstream connection {} for topic {}", self.id, self.topic);
    }
}

impl Drop for UpstreamConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    id: ConnectionId,
    topic: String,
    endpoint: Arc<dyn StreamEndpoint>,
    events: UnboundedSender<UpstreamMessage>,
) {
    let emit = |event: UpstreamEvent| {
        events
            .send(UpstreamMessage {
                topic: topic.clone(),
                connection_id: id,
                event,
            })
            .is_ok()
    };

    let mut stream = match endpoint.connect(&topic).await {
        Ok(stream) => stream,
        Err(e) => {
            info!("upstream connection {id} for {topic} failed: {e}");
            emit(UpstreamEvent::Error(e.to_string()));
            return;
        }
    };

    if !emit(UpstreamEvent::Open) {
        return;
    }

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(text) => {
                if !emit(UpstreamEvent::Message(decode_payload(&text))) {
                    debug!("broker gone, stopping upstream connection {id}");
                    return;
                }
            }
            Err(e) => {
                info!("upstream connection {id} for {topic} errored: {e}");
                emit(UpstreamEvent::Error(e.to_string()));
                return;
            }
        }
    }

    info!("upstream connection {id} for {topic} ended");
    emit(UpstreamEvent::Error(UpstreamError::Closed.to_string()));
}
