use std::time::Duration;

use serde::Deserialize;

use crate::broker::BrokerConfig;

/// Top-level configuration settings for the application.
///
/// Includes the gateway server, the upstream endpoint, the broker timings and
/// the log level.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the local gateway server.
///
/// Defines the host and port the gateway will bind to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Where upstream streams are opened. The topic is appended to `base_url`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UpstreamSettings {
    pub base_url: String,
}

/// Configuration settings for the broker.
///
/// Controls how long an unsubscribed topic keeps its upstream connection and
/// how often the idle reaper sweeps.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub grace_period_secs: u64,
    pub reap_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

impl BrokerSettings {
    /// Converts to the runtime broker configuration. Zero values are raised
    /// to one second so a positive grace period always exists.
    pub fn to_broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            grace_period: Duration::from_secs(self.grace_period_secs.max(1)),
            reap_interval: Duration::from_secs(self.reap_interval_secs.max(1)),
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub upstream: Option<PartialUpstreamSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialUpstreamSettings {
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub grace_period_secs: Option<u64>,
    pub reap_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server;
        let upstream = self.upstream;
        let broker = self.broker;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(defaults.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(defaults.server.port),
            },
            upstream: UpstreamSettings {
                base_url: upstream
                    .and_then(|u| u.base_url)
                    .unwrap_or(defaults.upstream.base_url),
            },
            broker: BrokerSettings {
                grace_period_secs: broker
                    .as_ref()
                    .and_then(|b| b.grace_period_secs)
                    .unwrap_or(defaults.broker.grace_period_secs),
                reap_interval_secs: broker
                    .as_ref()
                    .and_then(|b| b.reap_interval_secs)
                    .unwrap_or(defaults.broker.reap_interval_secs),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(defaults.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            upstream: UpstreamSettings {
                base_url: "ws://127.0.0.1:9000".to_string(),
            },
            broker: BrokerSettings {
                grace_period_secs: 60,
                reap_interval_secs: 30,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
