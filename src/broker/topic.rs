//! Topic registry entries.
//!
//! A `Topic` holds everything the broker knows about one topic: the upstream
//! connection (if any), its state, the subscribers and their delivery
//! channels, and when the topic last saw activity. Duplicate subscriptions
//! are a no-op.
//!
//! Only the broker actor owns `Topic` values; nothing here is synchronized.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::broker::message::{BroadcastEvent, EventSender};
use crate::upstream::{ConnectionId, UpstreamConnection};

pub type SubscriberId = String;

/// State of a topic's upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    pub state: ConnectionState,
    pub subscribers: HashMap<SubscriberId, EventSender>,
    pub last_activity: Instant,
    /// Upstream connections opened over the lifetime of this entry.
    pub connects: u32,
    connection: Option<UpstreamConnection>,
}

impl Topic {
    /// Create a new topic with no connection and no subscribers.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ConnectionState::Closed,
            subscribers: HashMap::new(),
            last_activity: Instant::now(),
            connects: 0,
            connection: None,
        }
    }

    /// Add a subscriber. Returns `false` when the id was already present.
    pub fn subscribe(&mut self, id: SubscriberId, channel: EventSender) -> bool {
        if self.subscribers.contains_key(&id) {
            return false;
        }
        self.subscribers.insert(id, channel);
        true
    }

    /// Remove a subscriber. Returns `false` when the id was unknown.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// True while a connection is being established or is open.
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(UpstreamConnection::id)
    }

    /// Installs a freshly opened connection; any previous one is closed.
    pub fn attach(&mut self, connection: UpstreamConnection) {
        self.release(ConnectionState::Connecting);
        self.connection = Some(connection);
        self.connects += 1;
    }

    /// Closes the connection, if any, and moves to `state`.
    pub fn release(&mut self, state: ConnectionState) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.state = state;
    }

    /// Sends `event` to every subscriber. A subscriber whose channel is gone
    /// is dropped from the topic; it does not affect the others.
    pub fn broadcast(&mut self, event: &BroadcastEvent) {
        let name = &self.name;
        self.subscribers.retain(|id, channel| {
            let delivered = channel.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!("subscriber {id} of {name} is gone, removing it");
            }
            delivered
        });
    }

    /// Sends `event` to a single subscriber.
    pub fn deliver(&mut self, id: &SubscriberId, event: BroadcastEvent) {
        let Some(channel) = self.subscribers.get(id) else {
            return;
        };
        if channel.send(event).is_err() {
            tracing::debug!("subscriber {id} of {} is gone, removing it", self.name);
            self.subscribers.remove(id);
        }
    }

    /// Drops subscribers whose receiving side has been closed. Returns how
    /// many were removed.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.subscribers.len();
        self.subscribers.retain(|_, channel| !channel.is_closed());
        before - self.subscribers.len()
    }
}
