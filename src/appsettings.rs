use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use crate::models::settings::Settings;

/// Loads settings from `appsettings.toml`, `appsettings.local.toml`, an
/// optional explicit file and `APP__*` environment variables, later sources
/// overriding earlier ones.
pub fn load(extra_file: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name("appsettings").required(false))
        .add_source(File::with_name("appsettings.local").required(false));

    if let Some(path) = extra_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
