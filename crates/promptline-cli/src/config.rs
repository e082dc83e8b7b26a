//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use promptline_batch::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_INPUT_SUFFIX, DEFAULT_MAX_FAIL_COUNT, DEFAULT_OUTPUT_SUFFIX,
    DEFAULT_WORKERS,
};
use promptline_batch::openrouter::DEFAULT_BASE_URL;
use promptline_batch::region::{DEFAULT_END_MARKER, DEFAULT_SHRINK_CHARS, DEFAULT_START_MARKER};
use promptline_batch::{ClientSettings, Policy, RegionMarkers};
use promptline_core::{HttpConfig, RetryPolicy};
use serde::Deserialize;

/// Global configuration for promptline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub workers: WorkersConfig,
    pub degrade: DegradeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub answer_path: PathBuf,
    pub input_suffix: String,
    pub output_suffix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./data"),
            output_dir: PathBuf::from("./results"),
            answer_path: PathBuf::from("./true_answers.json"),
            input_suffix: DEFAULT_INPUT_SUFFIX.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub model: String,
    /// One per worker; `${VAR}` entries are read from the environment
    #[serde(deserialize_with = "deserialize_env_vars")]
    pub keys: Vec<String>,
    /// Provider routing object sent verbatim, e.g. `{ order = ["DeepInfra"] }`
    pub provider: Option<serde_json::Value>,
    pub temperature: f64,
    pub token_limit_field: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Pause after every API call
    pub request_interval_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        let http = HttpConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: String::new(),
            keys: Vec::new(),
            provider: None,
            temperature: client.temperature,
            token_limit_field: client.token_limit_field,
            max_tokens: client.max_tokens,
            request_timeout_secs: http.request_timeout.as_secs(),
            connect_timeout_secs: http.connect_timeout.as_secs(),
            request_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub policy: Policy,
    /// Attempts per item per run
    pub max_retries: u32,
    /// Runs an item may fail before it is skipped for good
    pub max_fail_count: u32,
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            policy: Policy::default(),
            max_retries: retry.max_retries,
            max_fail_count: DEFAULT_MAX_FAIL_COUNT,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_secs: retry.max_delay.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub count: usize,
    pub batch_size: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DegradeConfig {
    pub start_marker: String,
    pub end_marker: String,
    pub shrink_chars: usize,
}

impl Default for DegradeConfig {
    fn default() -> Self {
        Self {
            start_marker: DEFAULT_START_MARKER.to_string(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            shrink_chars: DEFAULT_SHRINK_CHARS,
        }
    }
}

/// Deserialize a list of strings, each of which may be a `${VAR}` reference
fn deserialize_env_vars<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(raw
        .iter()
        .map(|s| {
            expand_env_var(s).unwrap_or_else(|| {
                log::warn!("Environment variable for {s} is not set");
                String::new()
            })
        })
        .collect())
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

/// Hide all but the last four characters of a credential
pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./promptline.toml (current directory)
    /// 2. ~/.config/promptline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("promptline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "promptline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Runtime configuration for the batch scheduler
    pub fn to_batch(&self) -> promptline_batch::Config {
        promptline_batch::Config {
            input_dir: self.paths.input_dir.clone(),
            output_dir: self.paths.output_dir.clone(),
            answer_path: self.paths.answer_path.clone(),
            input_suffix: self.paths.input_suffix.clone(),
            output_suffix: self.paths.output_suffix.clone(),
            policy: self.retry.policy,
            workers: self.workers.count,
            api_keys: self.api.keys.clone(),
            max_fail_count: self.retry.max_fail_count,
            batch_size: self.workers.batch_size,
            base_url: self.api.base_url.clone(),
            http: HttpConfig {
                request_timeout: Duration::from_secs(self.api.request_timeout_secs),
                connect_timeout: Duration::from_secs(self.api.connect_timeout_secs),
            },
            client: ClientSettings {
                model: self.api.model.clone(),
                provider: self.api.provider.clone(),
                temperature: self.api.temperature,
                token_limit_field: self.api.token_limit_field.clone(),
                max_tokens: self.api.max_tokens,
                retry: RetryPolicy {
                    max_retries: self.retry.max_retries,
                    base_delay: Duration::from_millis(self.retry.base_delay_ms),
                    max_delay: Duration::from_secs(self.retry.max_delay_secs),
                },
                request_interval: Duration::from_millis(self.api.request_interval_ms),
                markers: RegionMarkers {
                    start: self.degrade.start_marker.clone(),
                    end: self.degrade.end_marker.clone(),
                },
                shrink_chars: self.degrade.shrink_chars,
            },
        }
    }
}
