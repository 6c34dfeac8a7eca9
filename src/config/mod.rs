mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AppSettings, BrokerSettings, CacheSettings, LogSettings, PartialSettings, RealtimeSettings,
    Settings, StaticSettings, StoreSettings,
};

/// Loads `.env.local` and `.env` into the process environment if present.
///
/// Values already set in the environment win over both files.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
}

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct covering every collaborator of the service
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_").try_parsing(true));

    let config = builder.build()?;

    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}

#[cfg(test)]
mod tests;
