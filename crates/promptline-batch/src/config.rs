//! Runtime configuration for a batch run

use std::path::PathBuf;

use promptline_core::HttpConfig;

use crate::client::{ClientSettings, Policy};
use crate::openrouter::DEFAULT_BASE_URL;

/// Default input dataset file suffix
pub const DEFAULT_INPUT_SUFFIX: &str = "_changed.json";

/// Default result file suffix
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_result.json";

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_FAIL_COUNT: u32 = 3;

/// Everything one run needs; passed to the scheduler and nowhere global.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub answer_path: PathBuf,
    pub input_suffix: String,
    pub output_suffix: String,
    pub policy: Policy,
    pub workers: usize,
    /// One credential per worker, assigned in order
    pub api_keys: Vec<String>,
    pub max_fail_count: u32,
    pub batch_size: usize,
    pub base_url: String,
    pub http: HttpConfig,
    pub client: ClientSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("results"),
            answer_path: PathBuf::from("true_answers.json"),
            input_suffix: DEFAULT_INPUT_SUFFIX.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            policy: Policy::default(),
            workers: DEFAULT_WORKERS,
            api_keys: Vec::new(),
            max_fail_count: DEFAULT_MAX_FAIL_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: HttpConfig::default(),
            client: ClientSettings::default(),
        }
    }
}

impl Config {
    /// Reject settings a run cannot honour.
    ///
    /// `need_keys` is false for plan-only commands that never call the API.
    pub fn validate(&self, need_keys: bool) -> anyhow::Result<()> {
        anyhow::ensure!(self.workers >= 1, "workers must be at least 1");
        anyhow::ensure!(self.batch_size >= 1, "batch_size must be at least 1");
        anyhow::ensure!(self.max_fail_count >= 1, "max_fail_count must be at least 1");
        anyhow::ensure!(
            self.client.retry.max_retries >= 1,
            "max_retries must be at least 1"
        );
        anyhow::ensure!(!self.input_suffix.is_empty(), "input_suffix is empty");
        anyhow::ensure!(
            self.input_suffix != self.output_suffix,
            "output_suffix equals input_suffix; results would overwrite inputs"
        );
        anyhow::ensure!(
            self.client.shrink_chars >= 1,
            "shrink_chars must be at least 1"
        );
        anyhow::ensure!(
            !self.client.markers.start.is_empty() && !self.client.markers.end.is_empty(),
            "region markers must not be empty"
        );
        if need_keys {
            anyhow::ensure!(!self.client.model.is_empty(), "model is not set");
            anyhow::ensure!(
                self.api_keys.len() >= self.workers,
                "{} workers need {} API keys, found {}",
                self.workers,
                self.workers,
                self.api_keys.len()
            );
            if let Some(i) = self.api_keys[..self.workers]
                .iter()
                .position(|k| k.trim().is_empty())
            {
                anyhow::bail!("API key #{} is empty", i + 1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable() -> Config {
        let mut config = Config {
            workers: 2,
            api_keys: vec!["k1".into(), "k2".into()],
            ..Default::default()
        };
        config.client.model = "vendor/model".into();
        config
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_fail_count, 3);
        assert_eq!(config.input_suffix, "_changed.json");
        assert_eq!(config.policy, Policy::Retry);
        assert_eq!(config.client.temperature, 0.0);
        assert_eq!(config.client.max_tokens, 100);
    }

    #[test]
    fn valid_config_passes() {
        assert!(runnable().validate(true).is_ok());
    }

    #[test]
    fn too_few_keys_rejected() {
        let mut config = runnable();
        config.workers = 3;
        let err = config.validate(true).unwrap_err();
        assert!(err.to_string().contains("3 workers need 3 API keys, found 2"));
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn empty_key_rejected() {
        let mut config = runnable();
        config.api_keys[1] = "  ".into();
        assert!(config.validate(true).unwrap_err().to_string().contains("#2"));
    }

    #[test]
    fn same_suffix_rejected() {
        let mut config = runnable();
        config.output_suffix = config.input_suffix.clone();
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = runnable();
        config.workers = 0;
        assert!(config.validate(false).is_err());
    }
}
