use std::sync::{Arc, OnceLock};

use super::StaticConfig;

static CONFIG: OnceLock<Arc<StaticConfig>> = OnceLock::new();

/// Initialize the global configuration
///
/// Loads configuration from `path` (TOML, optional) plus `ADS__*` environment
/// overrides. If the file doesn't exist, uses in-memory defaults.
/// Only the first call has any effect.
///
/// # Examples
/// ```no_run
/// use adserver::config::init_config;
/// init_config("config.toml");
/// ```
pub fn init_config(path: &str) -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| Arc::new(StaticConfig::load_from(path)))
        .clone()
}
