//! Configuration management for wombo
//!
//! Endpoint URLs, per-call timeouts, poll cadence, retry policy and GIF
//! settings. Every field has a default matching the live service, so an
//! empty or missing file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::{DreamError, Result};

/// Top-level client configuration
///
/// Usually loaded from `wombo.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DreamConfig {
    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub animation: AnimationConfig,
}

/// Service URLs
///
/// `{token}`, `{build}` and `{id}` are substituted at request time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Site root, scraped for the Next.js build id
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Creation page, scraped for the `_app-<token>` bundle name
    #[serde(default = "default_create_page")]
    pub create_page: String,

    #[serde(default = "default_bundle_url")]
    pub bundle_url: String,

    /// Anonymous sign-up endpoint that mints the `idToken`
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    #[serde(default = "default_tasks_url")]
    pub tasks_url: String,

    #[serde(default = "default_styles_url")]
    pub styles_url: String,
}

/// Per-request timeouts in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_page_timeout_ms")]
    pub page_ms: u64,

    #[serde(default = "default_identity_timeout_ms")]
    pub identity_ms: u64,

    #[serde(default = "default_submit_timeout_ms")]
    pub submit_ms: u64,

    #[serde(default = "default_check_timeout_ms")]
    pub check_ms: u64,

    #[serde(default = "default_frame_timeout_ms")]
    pub frame_ms: u64,
}

/// Poll cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay before each status check
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Wall-clock bound on the whole wait
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,

    /// Growth factor applied to the delay after every check (1.0 = fixed)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

/// Retry policy for transient network failures on auth and status calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 0 disables retries
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// GIF output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,
}

// Default value providers
fn default_site_url() -> String {
    "https://dream.ai/".to_string()
}

fn default_create_page() -> String {
    "https://dream.ai/create".to_string()
}

fn default_bundle_url() -> String {
    "https://dream.ai/_next/static/chunks/pages/_app-{token}.js".to_string()
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com/v1/accounts:signUp".to_string()
}

fn default_tasks_url() -> String {
    "https://paint.api.wombo.ai/api/v2/tasks".to_string()
}

fn default_styles_url() -> String {
    "https://dream.ai/_next/data/{build}/create.json".to_string()
}

fn default_page_timeout_ms() -> u64 {
    10_000
}

fn default_identity_timeout_ms() -> u64 {
    20_000
}

fn default_submit_timeout_ms() -> u64 {
    20_000
}

fn default_check_timeout_ms() -> u64 {
    10_000
}

fn default_frame_timeout_ms() -> u64 {
    20_000
}

fn default_interval_ms() -> u64 {
    3_000
}

fn default_budget_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_interval_ms() -> u64 {
    10_000
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_frame_delay_ms() -> u64 {
    100
}

impl DreamConfig {
    /// Load configuration from `path`, or defaults if the file doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DreamError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the default configuration to `path`
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| DreamError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the poller can't work with
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(DreamError::Config("polling.interval_ms must be > 0".to_string()));
        }
        let multiplier = self.polling.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(DreamError::Config(
                "polling.backoff_multiplier must be a finite number >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Endpoints {
    pub fn bundle_url(&self, token: &str) -> String {
        self.bundle_url.replace("{token}", token)
    }

    pub fn task_url(&self, task_id: &str) -> String {
        format!("{}/{}", self.tasks_url.trim_end_matches('/'), task_id)
    }

    pub fn styles_url(&self, build_id: &str) -> String {
        self.styles_url.replace("{build}", build_id)
    }
}

impl Timeouts {
    pub fn page(&self) -> Duration {
        Duration::from_millis(self.page_ms)
    }

    pub fn identity(&self) -> Duration {
        Duration::from_millis(self.identity_ms)
    }

    pub fn submit(&self) -> Duration {
        Duration::from_millis(self.submit_ms)
    }

    pub fn check(&self) -> Duration {
        Duration::from_millis(self.check_ms)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            create_page: default_create_page(),
            bundle_url: default_bundle_url(),
            identity_url: default_identity_url(),
            tasks_url: default_tasks_url(),
            styles_url: default_styles_url(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_ms: default_page_timeout_ms(),
            identity_ms: default_identity_timeout_ms(),
            submit_ms: default_submit_timeout_ms(),
            check_ms: default_check_timeout_ms(),
            frame_ms: default_frame_timeout_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            budget_ms: default_budget_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_delay_ms: default_frame_delay_ms(),
        }
    }
}
