mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings, StorageSettings};

/// Prefix for environment overrides, e.g. `POPQ_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "POPQ";

/// Loads the configuration from `config/default` and the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Loads the configuration from the file at `path` (any extension the
/// `config` crate understands, the file may be absent) and from `POPQ_*`
/// environment variables, which win. A `.env` file is read first if present.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available, then merge with defaults
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge(Settings::default()))
}
