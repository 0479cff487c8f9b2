mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings, UpstreamSettings};

/// Prefix of the environment variables read by [`load_config`], e.g.
/// `POPSTREAM__BROKER__GRACE_PERIOD_SECS=90`.
pub const ENV_PREFIX: &str = "POPSTREAM";

/// Loads the configuration from the default file and environment variables
/// and merges it over [`Settings::default`].
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
