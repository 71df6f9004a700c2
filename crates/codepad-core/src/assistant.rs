//! Editor assistance: code generation/transformation tasks and inline suggestions.

use crate::config::AdvisorConfig;
use crate::errors::AdvisorError;
use crate::language::Language;
use crate::llm::{Message, ModelParameters, OpenAIClient, LLM};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+#-]*[ \t]*\r?\n(.*?)```").expect("code fence pattern is valid")
});

const SUGGEST_MAX_TOKENS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistTask {
    Generate,
    Optimize,
    Explain,
    Test,
    Analyze,
}

impl AssistTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistTask::Generate => "generate",
            AssistTask::Optimize => "optimize",
            AssistTask::Explain => "explain",
            AssistTask::Test => "test",
            AssistTask::Analyze => "analyze",
        }
    }

    fn prompt(&self, language: Language, content: &str) -> String {
        match self {
            AssistTask::Generate => format!(
                "Write a complete {lang} program for the following request. Reply with code only.\n\n{content}",
                lang = language,
                content = content
            ),
            AssistTask::Optimize => format!(
                "Optimize this {lang} code for speed and memory. Reply with the improved code only.\n\n```{lang}\n{content}\n```",
                lang = language,
                content = content
            ),
            AssistTask::Explain => format!(
                "Explain what this {lang} code does, step by step, as concise code comments.\n\n```{lang}\n{content}\n```",
                lang = language,
                content = content
            ),
            AssistTask::Test => format!(
                "Write test cases for this {lang} code as a runnable {lang} program.\n\n```{lang}\n{content}\n```",
                lang = language,
                content = content
            ),
            AssistTask::Analyze => format!(
                "Analyze the time and space complexity of this {lang} code and point out bottlenecks.\n\n```{lang}\n{content}\n```",
                lang = language,
                content = content
            ),
        }
    }
}

impl fmt::Display for AssistTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistTask {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(AssistTask::Generate),
            "optimize" => Ok(AssistTask::Optimize),
            "explain" => Ok(AssistTask::Explain),
            "test" => Ok(AssistTask::Test),
            "analyze" => Ok(AssistTask::Analyze),
            other => Err(AdvisorError::Parsing(format!("Unknown task '{}'", other))),
        }
    }
}

/// Returns the body of the first fenced code block, or the trimmed text when there is none.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim()
        .to_string()
}

pub struct CodeAssistant {
    llm: Arc<dyn LLM>,
    temperature: f32,
    max_tokens: u32,
}

impl CodeAssistant {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        let defaults = AdvisorConfig::default();
        Self {
            llm,
            temperature: defaults.temperature,
            max_tokens: defaults.assist_max_tokens,
        }
    }

    /// `None` when the advisor is disabled or no API key is available.
    pub fn from_config(config: &AdvisorConfig) -> Result<Option<Self>, AdvisorError> {
        if !config.enabled {
            return Ok(None);
        }
        match OpenAIClient::from_config(config) {
            Ok(client) => Ok(Some(Self {
                llm: Arc::new(client),
                temperature: config.temperature,
                max_tokens: config.assist_max_tokens,
            })),
            Err(AdvisorError::NotConfigured) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn generate(
        &self,
        task: AssistTask,
        content: &str,
        language: Language,
    ) -> Result<String, AdvisorError> {
        let messages = vec![
            Message::system(format!(
                "You are a coding assistant inside an online {} editor.",
                language
            )),
            Message::user(task.prompt(language, content)),
        ];
        let response = self
            .llm
            .generate(messages, &ModelParameters::new(self.temperature, self.max_tokens))
            .await?;
        Ok(strip_code_fences(response.text()))
    }

    /// Inline completion for the code typed so far; empty on any failure.
    pub async fn suggest(&self, code: &str, language: Language) -> String {
        let messages = vec![
            Message::system(
                "Continue the user's code. Reply with the next line or two of code only, without explanations.",
            ),
            Message::user(format!("```{}\n{}\n```", language, code)),
        ];
        match self
            .llm
            .generate(messages, &ModelParameters::new(self.temperature, SUGGEST_MAX_TOKENS))
            .await
        {
            Ok(response) => strip_code_fences(response.text()),
            Err(e) => {
                log::warn!("Suggestion request failed: {}", e);
                String::new()
            }
        }
    }
}
