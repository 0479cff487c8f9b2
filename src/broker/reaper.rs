//! Idle reaper.
//!
//! Topics whose subscriber set is empty and whose last activity is older than
//! the grace period get their upstream connection closed and their entry
//! removed. The sweep runs inside the broker actor, so a topic that regains a
//! subscriber is seen as busy and left alone.
//!
//! Subscribers whose receiver was dropped without an unsubscribe are pruned
//! first, so they cannot keep a connection alive.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::broker::topic::{ConnectionState, Topic};

/// True when `topic` may be evicted at `now`.
pub fn is_idle(topic: &Topic, now: Instant, grace_period: Duration) -> bool {
    topic.subscribers.is_empty() && topic.idle_for(now) > grace_period
}

/// Evicts every idle topic and returns how many were removed.
pub fn reap(topics: &mut HashMap<String, Topic>, now: Instant, grace_period: Duration) -> usize {
    for topic in topics.values_mut() {
        let pruned = topic.prune_closed();
        if pruned > 0 {
            debug!("pruned {pruned} closed subscribers of {}", topic.name);
        }
    }

    let idle: Vec<String> = topics
        .values()
        .filter(|topic| is_idle(topic, now, grace_period))
        .map(|topic| topic.name.clone())
        .collect();

    for name in &idle {
        if let Some(mut topic) = topics.remove(name) {
            info!(
                "reaping topic {name} after {:?} without subscribers",
                topic.idle_for(now)
            );
            topic.release(ConnectionState::Closed);
        }
    }

    idle.len()
}
