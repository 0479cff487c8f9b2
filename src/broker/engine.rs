//! Broker engine
//!
//! The broker owns the topic registry and every upstream connection. It runs
//! as a single tokio task that drains three inputs one at a time:
//! - control messages from client facades (subscribe/unsubscribe)
//! - events reported by upstream connections
//! - the idle reaper's interval
//!
//! Because only this task mutates the registry, no topic is ever observed in
//! a torn state and the reaper can never close a connection that still has
//! subscribers. The synchronous methods below are the actor's behaviour and
//! can be driven directly in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broker::handle::BrokerHandle;
use crate::broker::message::{BroadcastEvent, ControlMessage, EventKind, EventSender, Payload};
use crate::broker::reaper;
use crate::broker::topic::{ConnectionState, SubscriberId, Topic};
use crate::upstream::{
    ConnectionId, StreamEndpoint, UpstreamConnection, UpstreamEvent, UpstreamMessage,
};

/// Timing knobs of a broker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// How long a topic without subscribers keeps its upstream connection.
    pub grace_period: Duration,
    /// How often the idle reaper sweeps the registry.
    pub reap_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(60),
            reap_interval: Duration::from_secs(30),
        }
    }
}

/// Shortest reap interval a broker runs with; `interval` rejects zero.
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(1);

/// Read-only view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub topic: String,
    pub state: ConnectionState,
    pub subscribers: usize,
    pub connects: u32,
    pub idle_for: Duration,
}

#[derive(Debug)]
pub(crate) enum Command {
    Control(ControlMessage),
    Stats(oneshot::Sender<Vec<TopicStats>>),
    ReapIdle(oneshot::Sender<usize>),
    Shutdown,
}

pub struct Broker {
    topics: HashMap<String, Topic>,
    endpoint: Arc<dyn StreamEndpoint>,
    config: BrokerConfig,
    upstream_tx: UnboundedSender<UpstreamMessage>,
    next_connection_id: ConnectionId,
}

impl Broker {
    /// Creates a broker and the receiver its upstream connections report to.
    ///
    /// Most callers want [`Broker::spawn`]; this is for driving the broker by
    /// hand. A zero reap interval is raised to one millisecond.
    pub fn new(
        endpoint: Arc<dyn StreamEndpoint>,
        mut config: BrokerConfig,
    ) -> (Self, UnboundedReceiver<UpstreamMessage>) {
        if config.reap_interval < MIN_REAP_INTERVAL {
            warn!(
                "reap interval {:?} is too short, using {:?}",
                config.reap_interval, MIN_REAP_INTERVAL
            );
            config.reap_interval = MIN_REAP_INTERVAL;
        }
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();
        let broker = Self {
            topics: HashMap::new(),
            endpoint,
            config,
            upstream_tx,
            next_connection_id: 0,
        };
        (broker, upstream_rx)
    }

    /// Starts a broker actor on the current tokio runtime and returns the
    /// handle used to reach it. Every call creates an independent instance.
    pub fn spawn(endpoint: Arc<dyn StreamEndpoint>, config: BrokerConfig) -> BrokerHandle {
        let (broker, upstream_rx) = Self::new(endpoint, config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(broker.run(command_rx, upstream_rx));
        BrokerHandle::new(command_tx)
    }

    pub fn config(&self) -> BrokerConfig {
        self.config
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    /// Registers `subscriber_id` on `topic`, opening the upstream connection
    /// when the topic has none. A subscriber joining an open topic is sent a
    /// synthesized `Open` right away.
    pub fn subscribe(&mut self, topic: &str, subscriber_id: SubscriberId, channel: EventSender) {
        let entry = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic));

        if !entry.subscribe(subscriber_id.clone(), channel) {
            debug!("{subscriber_id} is already subscribed to {topic}");
            return;
        }
        entry.touch();
        debug!(
            "{subscriber_id} subscribed to {topic} ({} subscribers)",
            entry.subscribers.len()
        );

        if !entry.has_connection() {
            self.next_connection_id += 1;
            let connection = UpstreamConnection::open(
                self.next_connection_id,
                topic,
                Arc::clone(&self.endpoint),
                self.upstream_tx.clone(),
            );
            entry.attach(connection);
        } else if entry.state == ConnectionState::Open {
            entry.deliver(&subscriber_id, BroadcastEvent::open(topic));
        }
    }

    /// Removes `subscriber_id` from `topic`. The connection stays up; the
    /// reaper reclaims it once the grace period has passed.
    pub fn unsubscribe(&mut self, topic: &str, subscriber_id: &SubscriberId) {
        match self.topics.get_mut(topic) {
            Some(entry) => {
                if entry.unsubscribe(subscriber_id) {
                    entry.touch();
                    debug!(
                        "{subscriber_id} unsubscribed from {topic} ({} subscribers)",
                        entry.subscribers.len()
                    );
                }
            }
            None => debug!("unsubscribe from unknown topic {topic}"),
        }
    }

    pub fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Subscribe {
                topic,
                subscriber_id,
                channel,
            } => self.subscribe(&topic, subscriber_id, channel),
            ControlMessage::Unsubscribe {
                topic,
                subscriber_id,
            } => self.unsubscribe(&topic, &subscriber_id),
        }
    }

    /// Applies an upstream event to its topic and broadcasts it.
    ///
    /// Events from a connection the topic no longer holds are dropped.
    pub fn on_upstream_event(&mut self, message: UpstreamMessage) {
        let UpstreamMessage {
            topic,
            connection_id,
            event,
        } = message;

        let Some(entry) = self.topics.get_mut(&topic) else {
            debug!("dropping event for unknown topic {topic}");
            return;
        };
        if entry.connection_id() != Some(connection_id) {
            debug!("dropping event from stale connection {connection_id} of {topic}");
            return;
        }

        entry.touch();
        let event = match event {
            UpstreamEvent::Open => {
                info!("upstream for {topic} is open");
                entry.state = ConnectionState::Open;
                BroadcastEvent::open(&topic)
            }
            UpstreamEvent::Message(payload) => {
                BroadcastEvent::new(EventKind::Message, &topic, Some(payload))
            }
            UpstreamEvent::Error(reason) => {
                warn!("upstream for {topic} failed: {reason}");
                entry.release(ConnectionState::Errored);
                BroadcastEvent::new(EventKind::Error, &topic, Some(Payload::Raw(reason)))
            }
        };

        entry.broadcast(&event);
    }

    /// Runs one idle-reaper sweep now.
    pub fn reap_idle(&mut self) -> usize {
        self.reap_idle_at(Instant::now())
    }

    pub(crate) fn reap_idle_at(&mut self, now: Instant) -> usize {
        reaper::reap(&mut self.topics, now, self.config.grace_period)
    }

    /// Snapshot of the registry, sorted by topic name.
    pub fn stats(&self) -> Vec<TopicStats> {
        let now = Instant::now();
        let mut stats: Vec<TopicStats> = self
            .topics
            .values()
            .map(|topic| TopicStats {
                topic: topic.name.clone(),
                state: topic.state,
                subscribers: topic.subscribers.len(),
                connects: topic.connects,
                idle_for: topic.idle_for(now),
            })
            .collect();
        stats.sort_by(|a, b| a.topic.cmp(&b.topic));
        stats
    }

    /// Closes every connection and clears the registry.
    pub fn close_all(&mut self) {
        for (_, mut topic) in self.topics.drain() {
            topic.release(ConnectionState::Closed);
        }
    }

    async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut upstream: UnboundedReceiver<UpstreamMessage>,
    ) {
        let mut reap_timer = tokio::time::interval(self.config.reap_interval);
        reap_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        reap_timer.tick().await;

        info!(
            "broker started (grace period {:?}, reap interval {:?})",
            self.config.grace_period, self.config.reap_interval
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Control(message)) => self.handle_control(message),
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.stats());
                    }
                    Some(Command::ReapIdle(reply)) => {
                        let reaped = self.reap_idle();
                        let _ = reply.send(reaped);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(message) = upstream.recv() => self.on_upstream_event(message),
                _ = reap_timer.tick() => {
                    let reaped = self.reap_idle();
                    if reaped > 0 {
                        debug!("idle reaper evicted {reaped} topics");
                    }
                }
            }
        }

        self.close_all();
        info!("broker stopped");
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("topics", &self.topics.len())
            .field("config", &self.config)
            .finish()
    }
}
