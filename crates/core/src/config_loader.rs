use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::config::AppConfig;
use crate::validation::validate;

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering built-in defaults, the TOML file at `path`,
    /// and `STRADDLE_`-prefixed environment variables (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the merged configuration
    /// fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        Self::extract(Self::base(path.as_ref()))
    }

    /// Loads configuration with a profile overlay (`Config.<profile>.toml` next to `path`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed, or
    /// validation fails.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig> {
        let path = path.as_ref();
        let profile_path = path.with_file_name(format!("Config.{profile}.toml"));
        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(profile_path))
            .merge(Env::prefixed("STRADDLE_").split("__"));
        Self::extract(figment)
    }

    fn base(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("STRADDLE_").split("__"))
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment
            .extract()
            .context("Failed to parse configuration")?;
        validate(&config).context("Invalid configuration")?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }
}
