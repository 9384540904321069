//! Configuration management for the DDoS guard.
//!
//! Configuration is layered: built-in defaults, then an optional TOML
//! file, then `DDOS_GUARD__*` environment variables.

use std::env;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use crate::models::{Config, FirewallBackend};

/// Load configuration from the default file location and environment
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());
    load_config_from(&config_file)
}

/// Load configuration using `config_file` as the file layer
pub fn load_config_from(config_file: &str) -> Result<Config, ConfigError> {
    let defaults = Config::default();

    let config = ConfigBuilder::builder()
        .set_default("capture.max_packets", defaults.capture.max_packets as i64)?
        .set_default("capture.max_duration_secs", defaults.capture.max_duration_secs as i64)?
        .set_default("capture.progress_every", defaults.capture.progress_every as i64)?
        .set_default("classifier.model_path", defaults.classifier.model_path)?
        .set_default("classifier.allow_unscored", defaults.classifier.allow_unscored)?
        .set_default("response.simulate", defaults.response.simulate)?
        .set_default("response.operator", defaults.response.operator)?
        .set_default("response.firewall", FirewallBackend::platform_default().as_str())?
        .set_default("storage.data_dir", defaults.storage.data_dir)?
        .set_default("storage.block_list", defaults.storage.block_list)?
        .set_default("storage.action_log", defaults.storage.action_log)?
        .set_default("storage.alert_log", defaults.storage.alert_log)?
        .set_default("server.host", defaults.server.host)?
        .set_default("server.port", defaults.server.port as i64)?
        .add_source(File::with_name(config_file).required(false))
        .add_source(Environment::with_prefix("DDOS_GUARD").separator("__"))
        .build()?;

    config.try_deserialize()
}
