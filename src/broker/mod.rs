pub mod engine;
pub mod handle;
pub mod message;
pub mod reaper;
pub mod topic;

pub use engine::{Broker, BrokerConfig, TopicStats};
pub use handle::BrokerHandle;
pub use message::{BroadcastEvent, ControlMessage, EventKind, Payload};
pub use topic::{ConnectionState, SubscriberId};
