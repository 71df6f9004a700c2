//! Configuration types for the playground backend

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration, usually read from `codepad.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodepadConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where submitted programs run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    #[default]
    Native,
    Container,
}

impl IsolationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationMode::Native => "native",
            IsolationMode::Container => "container",
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(IsolationMode::Native),
            "container" | "docker" => Ok(IsolationMode::Container),
            other => Err(EngineError::Config(format!(
                "Unknown isolation mode '{}', expected 'native' or 'container'",
                other
            ))),
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    #[serde(default)]
    pub isolation: IsolationMode,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Per-stream cap on captured output
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default)]
    pub retain_workspaces: bool,
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl EngineConfig {
    /// Wall-clock bound for a whole pipeline under the configured isolation mode.
    pub fn timeout(&self) -> Duration {
        match self.isolation {
            IsolationMode::Native => Duration::from_millis(self.timeouts.native_ms),
            IsolationMode::Container => Duration::from_millis(self.timeouts.container_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            isolation: IsolationMode::default(),
            timeouts: TimeoutConfig::default(),
            max_output_bytes: default_max_output_bytes(),
            retain_workspaces: false,
            limits: ResourceLimits::default(),
        }
    }
}

/// Pipeline timeouts in milliseconds. Container startup counts against the budget,
/// hence the larger default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_native_timeout_ms")]
    pub native_ms: u64,
    #[serde(default = "default_container_timeout_ms")]
    pub container_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            native_ms: default_native_timeout_ms(),
            container_ms: default_container_timeout_ms(),
        }
    }
}

/// Optional limits applied to the run step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub cpu_seconds: Option<u64>,
    /// Container backend only
    #[serde(default)]
    pub pids: Option<i64>,
}

impl ResourceLimits {
    pub fn memory_bytes(&self) -> Option<u64> {
        self.memory_mb.map(|mb| mb * 1024 * 1024)
    }
}

/// Complexity advisor (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_estimate_max_tokens")]
    pub estimate_max_tokens: u32,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    /// Budget for the code assistant endpoints
    #[serde(default = "default_assist_max_tokens")]
    pub assist_max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl AdvisorConfig {
    /// True when the advisor is enabled and has a key to call the service with.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: default_api_base(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            estimate_max_tokens: default_estimate_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            assist_max_tokens: default_assist_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Environment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// dotenv-style files consulted for secrets; the process environment is never modified
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: Vec::new(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
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

fn default_scratch_root() -> PathBuf { std::env::temp_dir().join("codepad") }
fn default_max_output_bytes() -> usize { 1024 * 1024 }
fn default_native_timeout_ms() -> u64 { 5_000 }
fn default_container_timeout_ms() -> u64 { 10_000 }
fn default_true() -> bool { true }
fn default_api_base() -> String { "https://api.groq.com/openai/v1".to_string() }
fn default_model() -> String { "llama3-70b-8192".to_string() }
fn default_api_key_env() -> String { "GROQ_API_KEY".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_estimate_max_tokens() -> u32 { 100 }
fn default_summary_max_tokens() -> u32 { 60 }
fn default_assist_max_tokens() -> u32 { 1024 }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_bind_addr() -> String { "127.0.0.1:8000".to_string() }
fn default_max_body_size() -> usize { 256 * 1024 }
fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl CodepadConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.engine.timeouts.native_ms == 0 || self.engine.timeouts.container_ms == 0 {
            return Err(EngineError::Config(
                "Engine timeouts must be greater than 0".to_string(),
            ));
        }

        if self.engine.max_output_bytes == 0 {
            return Err(EngineError::Config(
                "Engine max_output_bytes must be greater than 0".to_string(),
            ));
        }

        if self.engine.scratch_root.as_os_str().is_empty() {
            return Err(EngineError::Config(
                "Engine scratch_root cannot be empty".to_string(),
            ));
        }

        if self.engine.limits.memory_mb == Some(0) || self.engine.limits.cpu_seconds == Some(0) {
            return Err(EngineError::Config(
                "Resource limits must be greater than 0 when set".to_string(),
            ));
        }

        if self.advisor.enabled {
            if self.advisor.model.is_empty() {
                return Err(EngineError::Config("Advisor model cannot be empty".to_string()));
            }
            if !self.advisor.api_base.starts_with("http://")
                && !self.advisor.api_base.starts_with("https://")
            {
                return Err(EngineError::Config(format!(
                    "Advisor api_base must be an http(s) URL, got '{}'",
                    self.advisor.api_base
                )));
            }
            if !(0.0..=2.0).contains(&self.advisor.temperature) {
                return Err(EngineError::Config(
                    "Advisor temperature must be between 0.0 and 2.0".to_string(),
                ));
            }
        }

        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(EngineError::Config(format!(
                "Invalid server bind_addr '{}'",
                self.server.bind_addr
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}
