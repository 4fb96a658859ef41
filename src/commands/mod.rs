// Command handlers - the operations behind each CLI subcommand. Errors come
// back as plain strings so the entry point can print them uniformly.

pub mod api;
pub mod config;
pub mod server;
pub mod settings;

use crate::config::AppConfig;

pub(crate) fn load_config() -> Result<AppConfig, String> {
    AppConfig::load().map_err(|e| e.to_string())
}
