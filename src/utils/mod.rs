//! The `utils` module holds the pieces shared by every other module of
//! `popstream`: the error types and the logging bootstrap.

pub mod error;
pub mod logging;

pub use error::{BrokerError, Result, UpstreamError};

#[cfg(test)]
mod tests;
