//! Converts raw per-step outcomes into the uniform result returned to callers.

use crate::executors::{RawOutcome, StepOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    CompileFailure,
    RuntimeFailure,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::CompileFailure => "compile_failure",
            ExecutionStatus::RuntimeFailure => "runtime_failure",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one execution request. Program failures live here, not in errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    /// `None` when the process timed out or was killed by a signal.
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub status: ExecutionStatus,
    pub duration: Duration,
    pub timeout: Duration,
}

impl ExecutionResult {
    /// Client-visible text for this result.
    pub fn output(&self) -> String {
        let text = match self.status {
            ExecutionStatus::Success => self.stdout.clone(),
            ExecutionStatus::Timeout => {
                let mut parts: Vec<&str> = [self.stdout.trim_end(), self.stderr.trim_end()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect();
                let notice = format!(
                    "Execution timed out after {} ms",
                    self.timeout.as_millis()
                );
                parts.push(&notice);
                parts.join("\n")
            }
            ExecutionStatus::CompileFailure | ExecutionStatus::RuntimeFailure => {
                if !self.stderr.trim().is_empty() {
                    self.stderr.clone()
                } else {
                    let exit = self.exit_message();
                    if self.stdout.trim().is_empty() {
                        exit
                    } else {
                        format!("{}\n{}", self.stdout.trim_end(), exit)
                    }
                }
            }
        };
        text.trim_end().to_string()
    }

    fn exit_message(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(code), _) => format!("Process exited with code {}", code),
            (None, Some(signal)) => format!("Process terminated by signal {}", signal),
            (None, None) => "Process failed to start".to_string(),
        }
    }
}

/// Folds the executed steps into one `ExecutionResult`.
///
/// The surfaced streams are those of the last step that ran: the final step when the
/// pipeline got that far, otherwise the failing build step.
pub fn normalize(raw: RawOutcome) -> ExecutionResult {
    let timed_out = raw.steps.iter().any(|s| s.timed_out);
    let duration = raw.steps.iter().map(|s| s.duration).sum();
    let reached_final = raw.reached_final_step();

    let Some(last) = raw.steps.last() else {
        return ExecutionResult {
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            exit_code: Some(0),
            signal: None,
            status: ExecutionStatus::Success,
            duration,
            timeout: raw.timeout,
        };
    };

    let status = if timed_out {
        ExecutionStatus::Timeout
    } else if last.succeeded() && reached_final {
        ExecutionStatus::Success
    } else if !reached_final {
        ExecutionStatus::CompileFailure
    } else {
        ExecutionStatus::RuntimeFailure
    };

    ExecutionResult {
        stdout: last.stdout.clone(),
        stderr: stderr_with_spawn_error(last),
        timed_out,
        exit_code: if timed_out { None } else { last.exit_code },
        signal: last.signal,
        status,
        duration,
        timeout: raw.timeout,
    }
}

fn stderr_with_spawn_error(step: &StepOutcome) -> String {
    match &step.spawn_error {
        Some(err) if step.stderr.trim().is_empty() => err.clone(),
        Some(err) => format!("{}\n{}", step.stderr.trim_end(), err),
        None => step.stderr.clone(),
    }
}
