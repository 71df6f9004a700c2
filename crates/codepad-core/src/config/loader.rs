//! Configuration loader for YAML files and secret resolution

use crate::config::types::*;
use crate::errors::EngineError;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use tokio::fs;

pub const DEFAULT_CONFIG_FILE: &str = "codepad.yaml";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<CodepadConfig, EngineError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            EngineError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from YAML text and resolve secrets
    pub fn from_str(content: &str) -> Result<CodepadConfig, EngineError> {
        let mut config: CodepadConfig = if content.trim().is_empty() {
            CodepadConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                EngineError::Config(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::resolve_advisor_auth(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given; otherwise `codepad.yaml` when it exists, else defaults.
    ///
    /// An explicitly named file that cannot be read is an error.
    pub async fn load_or_default(path: Option<&Path>) -> Result<CodepadConfig, EngineError> {
        if let Some(path) = path {
            return Self::from_file(path).await;
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if fs::try_exists(default_path).await.unwrap_or(false) {
            log::info!("Loading configuration from {}", default_path.display());
            return Self::from_file(default_path).await;
        }

        log::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
        Self::from_str("")
    }

    /// Resolve the advisor API key: explicit value, then env files, then the process
    /// environment.
    fn resolve_advisor_auth(config: &mut CodepadConfig) -> Result<(), EngineError> {
        if config.advisor.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            return Ok(());
        }

        let key_name = config.advisor.api_key_env.clone();
        for env_file in &config.environment.env_files {
            if !env_file.exists() {
                log::debug!("Env file {} not found, skipping", env_file.display());
                continue;
            }
            let vars = Self::load_env_file(env_file)?;
            if let Some(value) = vars.get(&key_name).filter(|v| !v.is_empty()) {
                config.advisor.api_key = Some(value.clone());
                return Ok(());
            }
        }

        if let Ok(value) = env::var(&key_name) {
            if !value.is_empty() {
                config.advisor.api_key = Some(value);
            }
        }

        Ok(())
    }

    /// Parse a dotenv-style `KEY=VALUE` file
    pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>, EngineError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Config(format!(
                "Failed to read env file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Ok(parse_env_content(&content))
    }
}

pub(crate) fn parse_env_content(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.insert(key.to_string(), value.to_string());
        }
    }
    vars
}
