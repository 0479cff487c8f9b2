//! In-memory endpoint used by the test suites.
//!
//! Every `connect` opens a fresh channel-backed stream; tests push payloads,
//! inject failures and hang up through the endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc;

use crate::upstream::{PayloadStream, StreamEndpoint};
use crate::utils::UpstreamError;

type FrameSender = mpsc::UnboundedSender<Result<String, UpstreamError>>;

#[derive(Default)]
pub(crate) struct MockEndpoint {
    connects: Mutex<HashMap<String, usize>>,
    streams: Mutex<HashMap<String, FrameSender>>,
    refuse: Mutex<HashSet<String>>,
}

impl MockEndpoint {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of successful or failed connect attempts for `topic`.
    pub(crate) fn connects(&self, topic: &str) -> usize {
        self.connects.lock().unwrap().get(topic).copied().unwrap_or(0)
    }

    pub(crate) fn total_connects(&self) -> usize {
        self.connects.lock().unwrap().values().sum()
    }

    /// Makes every following connect for `topic` fail until `accept` is called.
    pub(crate) fn refuse(&self, topic: &str) {
        self.refuse.lock().unwrap().insert(topic.to_string());
    }

    pub(crate) fn accept(&self, topic: &str) {
        self.refuse.lock().unwrap().remove(topic);
    }

    /// Pushes a payload on the newest stream of `topic`.
    pub(crate) fn push(&self, topic: &str, text: &str) {
        let streams = self.streams.lock().unwrap();
        let tx = streams.get(topic).expect("no stream for topic");
        tx.unbounded_send(Ok(text.to_string())).unwrap();
    }

    /// Fails the newest stream of `topic` with a transport error.
    pub(crate) fn fail(&self, topic: &str, reason: &str) {
        let streams = self.streams.lock().unwrap();
        let tx = streams.get(topic).expect("no stream for topic");
        tx.unbounded_send(Err(UpstreamError::Endpoint(reason.to_string())))
            .unwrap();
    }

    /// Ends the newest stream of `topic` as if the remote closed it.
    pub(crate) fn hang_up(&self, topic: &str) {
        self.streams.lock().unwrap().remove(topic);
    }

    /// True while the driver of the newest stream still holds it.
    pub(crate) fn is_streaming(&self, topic: &str) -> bool {
        self.streams
            .lock()
            .unwrap()
            .get(topic)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Yields until `topic` has seen at least `n` connect attempts.
    pub(crate) async fn wait_for_connects(&self, topic: &str, n: usize) {
        for _ in 0..10_000 {
            if self.connects(topic) >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {n} connects for {topic}, saw {}",
            self.connects(topic)
        );
    }
}

#[async_trait]
impl StreamEndpoint for MockEndpoint {
    async fn connect(&self, topic: &str) -> Result<PayloadStream, UpstreamError> {
        *self
            .connects
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_insert(0) += 1;

        if self.refuse.lock().unwrap().contains(topic) {
            return Err(UpstreamError::Endpoint("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded();
        self.streams.lock().unwrap().insert(topic.to_string(), tx);
        Ok(Box::pin(rx))
    }
}
