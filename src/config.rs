//! Configuration loaded from `codeforge.toml`.
//!
//! Every field has a default, so a missing file is a valid configuration.
//! `ANTHROPIC_API_KEY` and `CODEFORGE_SERVICE_URL` take precedence over the
//! file; command-line flags take precedence over both.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::client::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVICE_URL};
use crate::engine::EngineSettings;
use crate::generate::WaitOptions;
use crate::state_machine::DEFAULT_MAX_ITERATIONS;
use crate::workers::{DEFAULT_MODEL, WorkerSettings};

pub const CONFIG_FILE: &str = "codeforge.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Anthropic API key. Empty selects the offline stub model.
    pub api_key: String,
    pub model: String,
    /// Messages endpoint override (proxies, local gateways).
    pub llm_base_url: Option<String>,
    pub max_tokens: u32,

    /// Revision cycles before a workflow completes with open issues.
    pub max_iterations: u32,
    /// Concurrent coders per workflow; 0 runs every subtask at once.
    pub max_parallel_coders: usize,
    /// Address `codeforge serve` binds.
    pub listen: SocketAddr,

    /// Where `generate`, `status`, `result` and `list` find the service.
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            llm_base_url: None,
            max_tokens: WorkerSettings::default().max_tokens,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_parallel_coders: 0,
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            poll_interval_ms: 2000,
            max_wait_secs: 300,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads `path`, or `codeforge.toml` in the working directory when no
    /// path is given, then applies environment overrides.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default = Path::new(CONFIG_FILE);
                if default.exists() {
                    Self::read(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("ANTHROPIC_API_KEY")
            && !key.is_empty()
        {
            self.api_key = key;
        }
        if let Some(url) = var("CODEFORGE_SERVICE_URL")
            && !url.is_empty()
        {
            self.service_url = url;
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_iterations: self.max_iterations,
            max_parallel_coders: self.max_parallel_coders,
            worker: self.worker_settings(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}
