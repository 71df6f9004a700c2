//! Error types for the execution engine and its collaborators
//!
//! Program-level failures (compile errors, crashes, timeouts) are not errors here:
//! they are ordinary outcomes carried by `ExecutionResult`. The variants below are the
//! cases a caller must handle differently from program output.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Malformed source: {0}")]
    MalformedSource(String),
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// True for errors caused by the submitted request rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedSource(_) | EngineError::UnsupportedLanguage(_)
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Infrastructure(err.to_string())
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        EngineError::Infrastructure(format!("Docker: {}", err))
    }
}

// Failures talking to the external reasoning service
#[derive(Error, Debug, Clone)]
pub enum AdvisorError {
    #[error("Advisor service unavailable: {0}")]
    Unavailable(String),
    #[error("Advisor response could not be parsed: {0}")]
    Parsing(String),
    #[error("Advisor is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        AdvisorError::Unavailable(err.to_string())
    }
}
