//! The `client` module is the facade local callers hold.
//!
//! A [`Client`] turns `subscribe(topic, callback)` into control messages for
//! the broker and runs the callback for every event delivered on the
//! returned [`Subscription`]. Callers never see the broker's registry or its
//! connections.

pub mod pubsub_client;
pub use pubsub_client::{Client, Subscription};
