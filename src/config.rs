use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::channels::BUILTIN_CHANNELS;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
    #[serde(default = "default_billing")]
    pub billing: BTreeMap<String, f64>,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            channels: BTreeMap::new(),
            billing: default_billing(),
            api: ApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts. Zero disables backoff.
    #[serde(default)]
    pub backoff_ms: u64,
    #[serde(default = "default_true")]
    pub retry_permanent: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
            retry_permanent: true,
        }
    }
}

impl DispatchConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Gateway URL. Without one the channel runs dry and only logs payloads.
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_billing() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("direct-message".to_string(), 0.001),
        ("short-message".to_string(), 0.0075),
        ("push-alert".to_string(), 0.0005),
    ])
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_bind")]
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_api_bind(),
        }
    }
}

fn default_api_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Config {
    /// Settings for a built-in channel; channels without a section use defaults.
    pub fn channel(&self, channel_type: &str) -> ChannelConfig {
        self.channels.get(channel_type).cloned().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        if self.dispatch.max_attempts == 0 {
            anyhow::bail!("[dispatch] max_attempts must be at least 1");
        }
        for name in self.channels.keys() {
            if !BUILTIN_CHANNELS.contains(&name.as_str()) {
                anyhow::bail!(
                    "Unknown channel section [channels.{name}]; expected one of: {}",
                    BUILTIN_CHANNELS.join(", ")
                );
            }
        }
        if let Some((name, cost)) = self.billing.iter().find(|(_, c)| **c < 0.0 || !c.is_finite()) {
            anyhow::bail!("[billing] {name} has invalid unit cost {cost}");
        }
        Ok(())
    }
}

pub fn parse(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
    config.validate()?;
    Ok(config)
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load(path: &str) -> Result<Config> {
    let path = expand_tilde(path);
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse(&content)
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".herald")
}

pub async fn init_config_dir() -> Result<PathBuf> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(&base).await?;

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(&config_path, DEFAULT_CONFIG).await?;
    }
    Ok(config_path)
}

const DEFAULT_CONFIG: &str = r#"[dispatch]
max_attempts = 2
backoff_ms = 0
# Set to false to stop retrying failures the gateway marks as permanent (4xx).
retry_permanent = true

# Channels without an endpoint run dry and only log what they would send.
[channels.direct-message]
enabled = true
# endpoint = "https://gateway.example.com/dm"
timeout_secs = 10

[channels.short-message]
enabled = true
# endpoint = "https://gateway.example.com/sms"

[channels.push-alert]
enabled = true
# endpoint = "https://gateway.example.com/push"

# Unit cost per delivered notification.
[billing]
direct-message = 0.001
short-message = 0.0075
push-alert = 0.0005

[api]
bind = "127.0.0.1:3000"
"#;

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
