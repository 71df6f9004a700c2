// src/executors/native.rs
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::task::JoinHandle;
use which::which;

use super::{
    drive_pipeline, read_capped, CapturedOutput, CodeExecutor, RawOutcome, SharedOutput, StepOutcome,
    StepRunner,
};
use crate::config::ResourceLimits;
use crate::errors::EngineError;
use crate::language::Language;
use crate::pipeline::{Pipeline, Step, StepKind};
use crate::workspace::Workspace;

// How long to wait for pipe readers once the process is gone.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Runs pipeline steps as host subprocesses using the installed toolchains.
#[derive(Debug, Clone)]
pub struct NativeExecutor {
    limits: ResourceLimits,
    max_output_bytes: usize,
}

impl NativeExecutor {
    pub fn new(limits: ResourceLimits, max_output_bytes: usize) -> Self {
        Self {
            limits,
            max_output_bytes,
        }
    }

    /// Toolchain executables that are not on `PATH`, per language.
    pub fn missing_toolchains() -> Vec<(Language, &'static str)> {
        Language::ALL
            .iter()
            .flat_map(|lang| lang.toolchain().iter().map(move |tool| (*lang, *tool)))
            .filter(|(_, tool)| which(tool).is_err())
            .collect()
    }
}

impl Default for NativeExecutor {
    fn default() -> Self {
        Self::new(ResourceLimits::default(), 1024 * 1024)
    }
}

#[async_trait]
impl CodeExecutor for NativeExecutor {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn execute(
        &self,
        pipeline: &Pipeline,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<RawOutcome, EngineError> {
        drive_pipeline(self, pipeline, workspace, timeout).await
    }
}

#[async_trait]
impl StepRunner for NativeExecutor {
    async fn run_step(
        &self,
        _pipeline: &Pipeline,
        step: &Step,
        workspace: &Workspace,
        budget: Duration,
    ) -> Result<StepOutcome, EngineError> {
        let workspace_dir = workspace.path().to_string_lossy().into_owned();
        let (program, args) = step.resolve(&workspace_dir);

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(workspace.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if step.attach_stdin {
            let input = std::fs::File::open(workspace.input_path()).map_err(|e| {
                EngineError::Infrastructure(format!("Failed to open staged input: {}", e))
            })?;
            cmd.stdin(Stdio::from(input));
        } else {
            cmd.stdin(Stdio::null());
        }

        #[cfg(unix)]
        {
            // Own process group so a timeout can take down everything the step forked.
            cmd.process_group(0);
            if step.kind == StepKind::Run {
                apply_unix_limits(&mut cmd, &self.limits);
            }
        }

        let mut outcome = StepOutcome::new(step);
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            EngineError::Infrastructure(format!("Failed to start `{}`: {}", program, e))
        })?;
        let pid = child.id();

        let stdout = SharedOutput::with_limit(self.max_output_bytes);
        let stderr = SharedOutput::with_limit(self.max_output_bytes);
        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), stdout.clone()));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), stderr.clone()));

        match tokio::time::timeout(budget, child.wait()).await {
            Ok(Ok(status)) => {
                outcome.exit_code = status.code();
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    outcome.signal = status.signal();
                }
            }
            Ok(Err(e)) => {
                kill_process_group(pid);
                let _ = child.kill().await;
                outcome.spawn_error = Some(format!("Failed to wait for `{}`: {}", program, e));
            }
            Err(_) => {
                log::warn!(
                    "[{}] `{}` exceeded {:?}, killing process group",
                    workspace.request_id(),
                    step.display(),
                    budget
                );
                kill_process_group(pid);
                let _ = child.kill().await;
                outcome.timed_out = true;
            }
        }
        // Descendants left behind by a finished step die with it.
        kill_process_group(pid);
        outcome.duration = start.elapsed();

        outcome.stdout = collect(stdout_task, &stdout).await.into_string();
        outcome.stderr = collect(stderr_task, &stderr).await.into_string();
        Ok(outcome)
    }
}

/// Waits briefly for a reader to hit EOF, then keeps whatever it has read.
async fn collect(mut task: JoinHandle<()>, output: &SharedOutput) -> CapturedOutput {
    match tokio::time::timeout(READER_GRACE, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Output reader task failed: {}", e),
        Err(_) => {
            log::warn!("Output pipe still open after process exit, dropping reader");
            task.abort();
        }
    }
    output.take()
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: killpg only sends a signal; the group id is the child's pid because
        // the child was spawned with process_group(0).
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            log::debug!(
                "killpg({}) failed: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Apply Unix-specific resource limits
#[cfg(unix)]
fn apply_unix_limits(cmd: &mut Command, limits: &ResourceLimits) {
    let max_memory = limits.memory_bytes();
    let max_cpu = limits.cpu_seconds;

    if max_memory.is_none() && max_cpu.is_none() {
        return;
    }

    // SAFETY: pre_exec runs between fork() and exec() in the child process.
    // The closure only calls async-signal-safe libc functions (setrlimit) on
    // Copy values moved into it; the parent process is not affected.
    unsafe {
        cmd.pre_exec(move || {
            if let Some(mem) = max_memory {
                let limit = libc::rlimit {
                    rlim_cur: mem as libc::rlim_t,
                    rlim_max: mem as libc::rlim_t,
                };
                libc::setrlimit(libc::RLIMIT_AS, &limit);
            }

            if let Some(cpu) = max_cpu {
                let limit = libc::rlimit {
                    rlim_cur: cpu as libc::rlim_t,
                    rlim_max: cpu as libc::rlim_t,
                };
                libc::setrlimit(libc::RLIMIT_CPU, &limit);
            }

            Ok(())
        });
    }
}
