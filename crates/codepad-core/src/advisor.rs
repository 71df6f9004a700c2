//! Time/space complexity estimates from an external chat-completion service.
//!
//! The advisor never fails: any error from the service degrades to placeholder
//! values so the execution result is always delivered.

use crate::config::AdvisorConfig;
use crate::errors::AdvisorError;
use crate::language::Language;
use crate::llm::{Message, ModelParameters, OpenAIClient, LLM};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const NOT_AVAILABLE: &str = "N/A";

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Time:\s*O\(([^)]+)\)").expect("time pattern is valid"));
static SPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Space:\s*O\(([^)]+)\)").expect("space pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityEstimate {
    pub time: String,
    pub space: String,
    pub summary: String,
}

impl Default for ComplexityEstimate {
    fn default() -> Self {
        Self {
            time: NOT_AVAILABLE.to_string(),
            space: NOT_AVAILABLE.to_string(),
            summary: String::new(),
        }
    }
}

/// Extracts `O(...)` notations from free text; missing fields become `N/A`.
pub fn parse_complexity(text: &str) -> (String, String) {
    let extract = |pattern: &Regex| {
        pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| format!("O({})", m.as_str()))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };
    (extract(&TIME_PATTERN), extract(&SPACE_PATTERN))
}

fn estimate_prompt(language: Language, source: &str) -> String {
    format!(
        "Analyze this {lang} code:\n\n```{lang}\n{source}\n```\nRespond:\nTime: O(...)\nSpace: O(...)",
        lang = language,
        source = source
    )
}

fn summary_prompt(language: Language, source: &str) -> String {
    format!(
        "Explain in 1 line the time and space complexity of the following {lang} code:\n```{lang}\n{source}\n```",
        lang = language,
        source = source
    )
}

pub struct ComplexityAdvisor {
    llm: Arc<dyn LLM>,
    estimate_params: ModelParameters,
    summary_params: ModelParameters,
}

impl ComplexityAdvisor {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        let defaults = AdvisorConfig::default();
        Self {
            llm,
            estimate_params: ModelParameters::new(defaults.temperature, defaults.estimate_max_tokens),
            summary_params: ModelParameters::new(defaults.temperature, defaults.summary_max_tokens),
        }
    }

    /// `None` when the advisor is disabled or no API key is available.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>, AdvisorError> {
        if !config.enabled {
            return Ok(None);
        }
        let client = match OpenAIClient::from_config(config) {
            Ok(client) => client,
            Err(AdvisorError::NotConfigured) => {
                log::warn!(
                    "No API key in config or ${}; complexity estimates disabled",
                    config.api_key_env
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Some(Self {
            llm: Arc::new(client),
            estimate_params: ModelParameters::new(config.temperature, config.estimate_max_tokens),
            summary_params: ModelParameters::new(config.temperature, config.summary_max_tokens),
        }))
    }

    /// Two sequential calls: the `Time:`/`Space:` estimate, then a one-line summary.
    /// The summary is skipped when the first call fails.
    pub async fn estimate(&self, language: Language, source: &str) -> ComplexityEstimate {
        let mut estimate = ComplexityEstimate::default();

        let analysis = match self
            .llm
            .generate(
                vec![Message::user(estimate_prompt(language, source))],
                &self.estimate_params,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Complexity analysis failed: {}", e);
                return estimate;
            }
        };
        let (time, space) = parse_complexity(analysis.text());
        estimate.time = time;
        estimate.space = space;

        match self
            .llm
            .generate(
                vec![Message::user(summary_prompt(language, source))],
                &self.summary_params,
            )
            .await
        {
            Ok(response) => estimate.summary = response.text().trim().to_string(),
            Err(e) => log::warn!("Complexity summary failed: {}", e),
        }

        estimate
    }
}
