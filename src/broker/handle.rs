//! Cloneable handle to a running broker.
//!
//! Every method enqueues a command and returns without waiting for the
//! broker, except the async queries which wait for the reply.

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::broker::engine::{Command, TopicStats};
use crate::broker::message::ControlMessage;
use crate::utils::{BrokerError, Result};

#[derive(Debug, Clone)]
pub struct BrokerHandle {
    commands: UnboundedSender<Command>,
}

impl BrokerHandle {
    pub(crate) fn new(commands: UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Enqueues a subscribe or unsubscribe request.
    pub fn send(&self, message: ControlMessage) -> Result<()> {
        self.commands
            .send(Command::Control(message))
            .map_err(|_| BrokerError::Closed)
    }

    /// Current registry snapshot, sorted by topic.
    pub async fn topics(&self) -> Result<Vec<TopicStats>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stats(reply))
            .map_err(|_| BrokerError::Closed)?;
        response.await.map_err(|_| BrokerError::Closed)
    }

    /// Runs an idle-reaper sweep immediately; returns the evicted topic count.
    pub async fn reap_idle(&self) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::ReapIdle(reply))
            .map_err(|_| BrokerError::Closed)?;
        response.await.map_err(|_| BrokerError::Closed)
    }

    /// Stops the broker. All upstream connections are closed.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
