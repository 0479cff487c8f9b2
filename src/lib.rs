//! # PopStream
//!
//! `popstream` multiplexes upstream event streams. However many local
//! consumers subscribe to a topic, the broker keeps exactly one upstream
//! connection for it and fans every event out to all of them. Connections
//! without subscribers are closed by an idle reaper once a grace period has
//! passed, so short gaps (a page reload, a tab switch) do not cause a
//! reconnect.
//!
//! ## Core Modules
//!
//! - `broker`: the actor that owns the topic registry, the upstream
//!   connections and the idle reaper.
//! - `client`: the subscribe/cancel facade handed to consumers.
//! - `config`: loads settings from `config/default` and the environment.
//! - `transport`: a local WebSocket gateway so separate processes or tabs can
//!   share one broker.
//! - `upstream`: the endpoint abstraction and its WebSocket implementation.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod upstream;
pub mod utils;
