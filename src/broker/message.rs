//! Messages flowing into and out of the broker.
//!
//! `ControlMessage` is the only mutation input a client facade can send;
//! `BroadcastEvent` is the only output the broker produces. Both travel over
//! tokio channels, so neither side ever touches the other's state.
//!
//! `BroadcastEvent` serializes to the notification shape consumers see:
//!
//! ```json
//! {"kind": "message", "topic": "issue:42", "data": {"issue_id": "42"}, "timestamp": 1725000000000}
//! ```
//!
//! `data` is omitted when there is no payload (for example on `open`).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::broker::topic::SubscriberId;

/// Channel on which the broker delivers events to one subscriber.
pub type EventSender = UnboundedSender<BroadcastEvent>;

/// Kind of a broadcast event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Message,
    Error,
}

/// A decoded upstream payload.
///
/// Payloads that parse as JSON are carried as a value; anything else is kept
/// verbatim so malformed input is still delivered. Serialized untagged, so a
/// raw payload cannot be told apart from a JSON string once encoded; use
/// [`Payload::is_raw`] before serializing when the difference matters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(String),
}

impl Payload {
    /// Returns the JSON value when the payload was decoded.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Payload::Raw(_))
    }
}

/// One event fanned out to every subscriber of `topic`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastEvent {
    pub kind: EventKind,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    /// Broker receive time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl BroadcastEvent {
    pub fn new(kind: EventKind, topic: &str, data: Option<Payload>) -> Self {
        Self {
            kind,
            topic: topic.to_string(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn open(topic: &str) -> Self {
        Self::new(EventKind::Open, topic, None)
    }
}

/// Subscribe/unsubscribe requests sent by client facades.
#[derive(Debug)]
pub enum ControlMessage {
    Subscribe {
        topic: String,
        subscriber_id: SubscriberId,
        channel: EventSender,
    },
    Unsubscribe {
        topic: String,
        subscriber_id: SubscriberId,
    },
}
