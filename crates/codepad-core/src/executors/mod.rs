//! Isolated execution backends.
//!
//! Both backends run a `Pipeline` step by step against one shared deadline. A step that
//! fails before the final one stops the pipeline; the caller receives every outcome
//! that was produced so the normalizer can tell compile failures from runtime ones.

use crate::errors::EngineError;
use crate::pipeline::{Pipeline, Step, StepKind};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};

pub mod docker;
pub mod native;

pub use docker::DockerExecutor;
pub use native::NativeExecutor;

const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// What happened to a single pipeline step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub kind: StepKind,
    pub command: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// Set when the process could not be started at all.
    pub spawn_error: Option<String>,
    pub duration: Duration,
}

impl StepOutcome {
    pub fn new(step: &Step) -> Self {
        Self {
            kind: step.kind,
            command: step.display(),
            exit_code: None,
            signal: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            spawn_error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.spawn_error.is_none() && self.exit_code == Some(0)
    }
}

/// Outcomes of the steps that actually ran, in order.
#[derive(Debug, Clone)]
pub struct RawOutcome {
    pub steps: Vec<StepOutcome>,
    pub total_steps: usize,
    pub timeout: Duration,
}

impl RawOutcome {
    /// True when every step of the pipeline ran.
    pub fn reached_final_step(&self) -> bool {
        self.steps.len() == self.total_steps
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Runs `pipeline` inside `workspace`, bounded by `timeout` in total.
    ///
    /// Program failures are reported inside the returned outcome. `Err` is reserved for
    /// the case where no process could be started at all.
    async fn execute(
        &self,
        pipeline: &Pipeline,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<RawOutcome, EngineError>;
}

#[async_trait]
pub(crate) trait StepRunner: Send + Sync {
    async fn run_step(
        &self,
        pipeline: &Pipeline,
        step: &Step,
        workspace: &Workspace,
        budget: Duration,
    ) -> Result<StepOutcome, EngineError>;
}

pub(crate) async fn drive_pipeline<R: StepRunner + ?Sized>(
    runner: &R,
    pipeline: &Pipeline,
    workspace: &Workspace,
    timeout: Duration,
) -> Result<RawOutcome, EngineError> {
    let deadline = Instant::now() + timeout;
    let mut steps = Vec::with_capacity(pipeline.steps.len());

    for (index, step) in pipeline.steps.iter().enumerate() {
        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            let mut outcome = StepOutcome::new(step);
            outcome.timed_out = true;
            steps.push(outcome);
            break;
        }

        let outcome = match runner.run_step(pipeline, step, workspace, budget).await {
            Ok(outcome) => outcome,
            Err(e) if index == 0 => return Err(e),
            Err(e) => {
                let mut outcome = StepOutcome::new(step);
                outcome.spawn_error = Some(e.to_string());
                outcome
            }
        };

        log::debug!(
            "[{}] step `{}` finished: exit={:?} signal={:?} timed_out={} in {:?}",
            workspace.request_id(),
            outcome.command,
            outcome.exit_code,
            outcome.signal,
            outcome.timed_out,
            outcome.duration
        );

        let stop = !outcome.succeeded();
        steps.push(outcome);
        if stop {
            break;
        }
    }

    Ok(RawOutcome {
        steps,
        total_steps: pipeline.steps.len(),
        timeout,
    })
}

/// Output buffer that stops growing at a byte limit.
#[derive(Debug, Default)]
pub(crate) struct CapturedOutput {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl CapturedOutput {
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub(crate) fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn into_string(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Capture buffer shared between a pipe reader task and the step that owns it.
///
/// The step can take whatever was read so far even if the reader never finishes.
#[derive(Debug, Clone)]
pub(crate) struct SharedOutput(Arc<Mutex<CapturedOutput>>);

impl SharedOutput {
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self(Arc::new(Mutex::new(CapturedOutput::with_limit(limit))))
    }

    fn push(&self, chunk: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(chunk);
    }

    pub(crate) fn take(&self) -> CapturedOutput {
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let limit = guard.limit;
        std::mem::replace(&mut *guard, CapturedOutput::with_limit(limit))
    }
}

/// Reads a child pipe to EOF into `output`, which keeps at most its limit.
///
/// Bytes past the limit are drained and discarded so the child never blocks on a
/// full pipe.
pub(crate) async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, output: SharedOutput) {
    let Some(mut reader) = reader else {
        return;
    };
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => output.push(&buf[..n]),
            Err(e) => {
                log::debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
}
