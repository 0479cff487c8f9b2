//! Client facade
//!
//! Each `subscribe` call gets its own subscriber id, its own delivery channel
//! and its own dispatcher task. The dispatcher runs the callback once per
//! event, in the order the broker delivered them, so a slow or panicking
//! callback only ever holds up its own subscription.
//!
//! Cancellation race: `cancel` flips a flag the dispatcher checks before
//! every invocation, so once `cancel` returns no new callback starts. A
//! callback that was already running when `cancel` was called finishes
//! normally; at most that one in-flight invocation can overlap the cancel.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::message::{BroadcastEvent, ControlMessage};
use crate::broker::{BrokerHandle, SubscriberId};
use crate::utils::Result;

type Callback = Arc<dyn Fn(BroadcastEvent) + Send + Sync>;

/// Handle a local caller uses to subscribe to topics.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the client, used in logs.
    pub id: String,
    broker: BrokerHandle,
}

impl Client {
    pub fn new(broker: BrokerHandle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            broker,
        }
    }

    /// Registers interest in `topic`. `on_event` runs on a tokio task for
    /// every event delivered to this subscription, never inside this call.
    ///
    /// Must be called from within a tokio runtime. Fails only when the broker
    /// has shut down.
    pub fn subscribe<F>(&self, topic: &str, on_event: F) -> Result<Subscription>
    where
        F: Fn(BroadcastEvent) + Send + Sync + 'static,
    {
        let subscriber_id = Uuid::new_v4().to_string();
        let (channel, events) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        // The receiver is owned by a running dispatcher before the broker
        // ever sees the channel.
        let dispatcher = tokio::spawn(dispatch(
            subscriber_id.clone(),
            events,
            Arc::clone(&cancelled),
            Arc::new(on_event),
        ));

        if let Err(e) = self.broker.send(ControlMessage::Subscribe {
            topic: topic.to_string(),
            subscriber_id: subscriber_id.clone(),
            channel,
        }) {
            dispatcher.abort();
            return Err(e);
        }

        debug!("client {} subscribed to {topic} as {subscriber_id}", self.id);

        Ok(Subscription {
            topic: topic.to_string(),
            subscriber_id,
            broker: self.broker.clone(),
            cancelled,
            dispatcher,
        })
    }
}

/// A live subscription. Dropping it cancels it.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    subscriber_id: SubscriberId,
    broker: BrokerHandle,
    cancelled: Arc<AtomicBool>,
    dispatcher: JoinHandle<()>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> &SubscriberId {
        &self.subscriber_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stops delivery and unsubscribes. Safe to call more than once.
    ///
    /// Does not close the upstream connection; the broker's idle reaper does
    /// that once the topic has had no subscribers for the grace period.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        // A closed broker has nothing left to unsubscribe from.
        let _ = self.broker.send(ControlMessage::Unsubscribe {
            topic: self.topic.clone(),
            subscriber_id: self.subscriber_id.clone(),
        });
        self.dispatcher.abort();
        debug!("subscription {} to {} cancelled", self.subscriber_id, self.topic);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn dispatch(
    subscriber_id: SubscriberId,
    mut events: UnboundedReceiver<BroadcastEvent>,
    cancelled: Arc<AtomicBool>,
    on_event: Callback,
) {
    while let Some(event) = events.recv().await {
        if cancelled.load(Ordering::Acquire) {
            break;
        }
        if catch_unwind(AssertUnwindSafe(|| on_event(event))).is_err() {
            warn!("callback of subscription {subscriber_id} panicked; event skipped");
        }
    }
}
