//! Request-level orchestration: stage, select, execute, normalize, then advise.

use crate::advisor::{ComplexityAdvisor, ComplexityEstimate};
use crate::config::{CodepadConfig, IsolationMode};
use crate::errors::EngineError;
use crate::executors::{CodeExecutor, DockerExecutor, NativeExecutor};
use crate::language::Language;
use crate::normalizer::{normalize, ExecutionResult};
use crate::pipeline::Pipeline;
use crate::workspace::WorkspaceStager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language: Language,
    #[serde(default)]
    pub stdin: String,
}

impl ExecutionRequest {
    pub fn new(language: Language, source_code: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            language,
            stdin: String::new(),
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = stdin.into();
        self
    }

    /// Validates the language name; the only place untrusted language strings enter.
    pub fn parse(
        language: &str,
        source_code: impl Into<String>,
        stdin: Option<String>,
    ) -> Result<Self, EngineError> {
        let language: Language = language.parse()?;
        Ok(Self::new(language, source_code).with_stdin(stdin.unwrap_or_default()))
    }
}

/// Execution result plus the advisor's estimate.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: ExecutionResult,
    pub complexity: ComplexityEstimate,
}

pub struct ExecutionEngine {
    stager: WorkspaceStager,
    executor: Arc<dyn CodeExecutor>,
    timeout: Duration,
    advisor: Option<Arc<ComplexityAdvisor>>,
}

impl ExecutionEngine {
    pub fn new(stager: WorkspaceStager, executor: Arc<dyn CodeExecutor>, timeout: Duration) -> Self {
        Self {
            stager,
            executor,
            timeout,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<ComplexityAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Builds the engine with the backend selected by `engine.isolation`.
    pub fn from_config(config: &CodepadConfig) -> Result<Self, EngineError> {
        let engine_config = &config.engine;
        let stager = WorkspaceStager::new(&engine_config.scratch_root)
            .with_retain(engine_config.retain_workspaces);

        let executor: Arc<dyn CodeExecutor> = match engine_config.isolation {
            IsolationMode::Native => {
                let missing = NativeExecutor::missing_toolchains();
                for (language, tool) in &missing {
                    log::warn!("`{}` not found on PATH; {} submissions will fail", tool, language);
                }
                Arc::new(NativeExecutor::new(
                    engine_config.limits.clone(),
                    engine_config.max_output_bytes,
                ))
            }
            IsolationMode::Container => Arc::new(DockerExecutor::connect(
                engine_config.limits.clone(),
                engine_config.max_output_bytes,
            )?),
        };

        let mut engine = Self::new(stager, executor, engine_config.timeout());
        match ComplexityAdvisor::from_config(&config.advisor) {
            Ok(Some(advisor)) => engine = engine.with_advisor(Arc::new(advisor)),
            Ok(None) => {}
            Err(e) => return Err(EngineError::Config(e.to_string())),
        }

        log::info!(
            "Execution engine ready: backend={}, timeout={:?}, scratch_root={}, advisor={}",
            engine.backend(),
            engine.timeout,
            engine.stager.scratch_root().display(),
            engine.advisor.is_some()
        );
        Ok(engine)
    }

    pub fn backend(&self) -> &'static str {
        self.executor.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Runs one submission. Program failures come back as a normal result; `Err` means
    /// the request was rejected or the host could not run it.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, EngineError> {
        let workspace = self
            .stager
            .stage(request.language, &request.source_code, &request.stdin)?;
        let pipeline = Pipeline::for_workspace(&workspace);

        log::info!(
            "[{}] Executing {} submission with {} backend ({} steps)",
            workspace.request_id(),
            request.language,
            self.executor.name(),
            pipeline.steps.len()
        );

        let raw = match self.executor.execute(&pipeline, &workspace, self.timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("[{}] Execution failed: {}", workspace.request_id(), e);
                return Err(e);
            }
        };
        let result = normalize(raw);

        log::info!(
            "[{}] Finished: status={} exit={:?} in {:?}",
            workspace.request_id(),
            result.status,
            result.exit_code,
            result.duration
        );
        Ok(result)
    }

    /// `execute`, then the complexity estimate once the result is final.
    pub async fn run(&self, request: &ExecutionRequest) -> Result<RunReport, EngineError> {
        let result = self.execute(request).await?;
        let complexity = match &self.advisor {
            Some(advisor) => advisor.estimate(request.language, &request.source_code).await,
            None => ComplexityEstimate::default(),
        };
        Ok(RunReport { result, complexity })
    }
}
