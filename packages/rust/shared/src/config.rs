//! Application configuration for leadflow.
//!
//! User config lives at `~/.leadflow/leadflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LeadflowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadflow";

// ---------------------------------------------------------------------------
// Config structs (matching leadflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings for classification.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Downstream webhook settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum in-flight classification/delivery calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Pause between concurrency chunks, in ms.
    #[serde(default)]
    pub chunk_delay_ms: u64,

    /// Lead database path.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            chunk_delay_ms: 0,
            database_path: default_database_path(),
        }
    }
}

fn default_concurrency() -> u32 {
    5
}
fn default_database_path() -> String {
    "~/.leadflow/leads.db".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for classification.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API base URL (chat completions live under it).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[webhook]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving one POST per classified lead.
    #[serde(default)]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime scheduling configuration, merged from config file + CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Concurrency bound K. Always at least 1.
    pub concurrency: usize,
    /// Optional pacing delay between chunks.
    pub chunk_delay: Duration,
}

impl RunConfig {
    pub fn new(concurrency: usize, chunk_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            chunk_delay,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(default_concurrency() as usize, Duration::ZERO)
    }
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new(
            config.defaults.concurrency as usize,
            Duration::from_millis(config.defaults.chunk_delay_ms),
        )
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| LeadflowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadflow/leadflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadflowError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| LeadflowError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadflowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadflowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadflowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| LeadflowError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Read the OpenRouter API key from its env var, rejecting unset or empty values.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LeadflowError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

/// Parse and check a webhook URL (must be http or https).
pub fn validate_webhook_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(LeadflowError::config(
            "webhook URL is not set. Pass --webhook-url or set [webhook] url in the config file",
        ));
    }
    let url = Url::parse(raw.trim())
        .map_err(|e| LeadflowError::config(format!("invalid webhook URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LeadflowError::config(format!(
            "webhook URL must use http or https, got '{other}'"
        ))),
    }
}
