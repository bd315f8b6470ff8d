//! Bootstrap configuration loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<config dir>/dcmp/config.toml`
//! 4. Built-in defaults (no file)
//!
//! Every TOML section and field is optional; missing values fall back to
//! built-in defaults.

use crate::{ApiKey, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DCMP_CONFIG";

/// Environment variable carrying an initial provider API key
pub const API_KEY_ENV_VAR: &str = "DCMP_API_KEY";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP command surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Generation service (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider name; also the CredentialStore key
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional key seeded into the session store at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

/// What to do when a revised plan changes already-generated instruments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionPolicy {
    /// Skip the check
    Ignore,
    /// Log each deviation and accept the plan
    #[default]
    Warn,
    /// Fail the request
    Reject,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub revision_policy: RevisionPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_provider_name() -> String {
    "deepseek".to_string()
}

fn default_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the config file following the priority order in the module docs
///
/// Returns `None` when no file applies and built-in defaults should be used.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("dcmp").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve and load configuration, falling back to defaults when no file applies
///
/// Returns the file the values came from, `None` for built-in defaults. This
/// runs before logging is set up, so reporting the source is left to the caller.
///
/// An explicitly named file (CLI or ENV) that cannot be read is an error; the
/// platform default location is only used when it exists.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((TomlConfig::default(), None)),
    }
}

/// Resolve an initial API key
///
/// **Priority:** ENV → TOML. Returns the key and the name of its source.
/// Empty or whitespace-only values are skipped.
pub fn resolve_initial_api_key(config: &TomlConfig) -> Option<(ApiKey, &'static str)> {
    let env_key = std::env::var(API_KEY_ENV_VAR).ok().and_then(ApiKey::new);
    let toml_key = config.provider.api_key.as_deref().and_then(ApiKey::new);

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "API key found in both environment and TOML config. Using environment (highest priority)."
        );
    }

    env_key
        .map(|k| (k, "environment"))
        .or_else(|| toml_key.map(|k| (k, "TOML")))
}
