//! Gateway wire protocol.
//!
//! ```json
//! {"type": "subscribe", "topic": "issue:42", "id": "issue-panel"}
//! {"type": "unsubscribe", "id": "issue-panel"}
//! {"type": "event", "id": "issue-panel", "kind": "message", "data": {"issue_id": "42"}, "timestamp": 1725000000000}
//! {"type": "event", "id": "issue-panel", "kind": "message", "data": "oops{", "raw": true, "timestamp": 1725000000000}
//! {"type": "error", "message": "invalid request"}
//! ```
//!
//! `raw` is present only when `data` is verbatim text rather than decoded
//! JSON: an upstream payload that did not parse, or an error reason.

use serde::{Deserialize, Serialize};

use crate::broker::message::{BroadcastEvent, EventKind, Payload};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String, id: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { id: String },
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "event")]
    Event {
        id: String,
        kind: EventKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Payload>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        raw: bool,
        timestamp: i64,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    /// Wraps a broadcast event for the subscription named `id`.
    pub fn event(id: &str, event: BroadcastEvent) -> Self {
        ServerMessage::Event {
            id: id.to_string(),
            kind: event.kind,
            raw: event.data.as_ref().is_some_and(Payload::is_raw),
            data: event.data,
            timestamp: event.timestamp,
        }
    }
}
