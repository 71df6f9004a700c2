// src/executors/docker.rs
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    KillContainerOptions as BollardKillContainerOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::{Duration, Instant};

use super::{drive_pipeline, CapturedOutput, CodeExecutor, RawOutcome, StepOutcome, StepRunner};
use crate::config::ResourceLimits;
use crate::errors::EngineError;
use crate::pipeline::{Pipeline, Step};
use crate::workspace::{Workspace, INPUT_FILE_NAME};

/// Mount point of the workspace inside every runner container.
pub const CONTAINER_WORK_DIR: &str = "/app";

/// Runs each pipeline step in a fresh container of the language's runner image.
pub struct DockerExecutor {
    docker: Docker,
    limits: ResourceLimits,
    max_output_bytes: usize,
}

impl DockerExecutor {
    pub fn connect(limits: ResourceLimits, max_output_bytes: usize) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::with_client(docker, limits, max_output_bytes))
    }

    pub fn with_client(docker: Docker, limits: ResourceLimits, max_output_bytes: usize) -> Self {
        Self {
            docker,
            limits,
            max_output_bytes,
        }
    }

    /// Checks that the daemon answers.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await?;
        Ok(())
    }

    fn container_config(
        &self,
        pipeline: &Pipeline,
        step: &Step,
        workspace: &Workspace,
    ) -> Result<ContainerCreateBody, EngineError> {
        let host_dir = workspace.path().to_str().ok_or_else(|| {
            EngineError::Infrastructure("Workspace path is not valid UTF-8".to_string())
        })?;

        let mut env: Vec<String> = pipeline
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        env.sort();

        Ok(ContainerCreateBody {
            image: Some(pipeline.image.to_string()),
            entrypoint: Some(container_command(step)),
            env: Some(env),
            working_dir: Some(CONTAINER_WORK_DIR.to_string()),
            network_disabled: Some(true),
            host_config: Some(HostConfig {
                binds: Some(vec![format!("{}:{}", host_dir, CONTAINER_WORK_DIR)]),
                network_mode: Some("none".to_string()),
                memory: self.limits.memory_bytes().map(|b| b as i64),
                pids_limit: self.limits.pids,
                ..Default::default()
            }),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        })
    }

    async fn collect_logs(&self, container_id: &str) -> Result<(String, String), EngineError> {
        let mut output_stream = self.docker.logs(
            container_id,
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut stdout = CapturedOutput::with_limit(self.max_output_bytes);
        let mut stderr = CapturedOutput::with_limit(self.max_output_bytes);
        while let Some(log_result) = output_stream.next().await {
            match log_result? {
                LogOutput::StdOut { message } => stdout.push(&message),
                LogOutput::StdErr { message } => stderr.push(&message),
                _ => {}
            }
        }
        Ok((stdout.into_string(), stderr.into_string()))
    }

    async fn create_and_start(
        &self,
        name: &str,
        config: ContainerCreateBody,
    ) -> Result<String, EngineError> {
        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(name.to_string()),
            ..Default::default()
        });
        let container = self.docker.create_container(options, config).await?;
        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<BollardStartContainerOptionsQuery>)
            .await
        {
            self.remove(&container.id).await;
            return Err(e.into());
        }
        Ok(container.id)
    }

    /// Force-removes a container by id or name without waiting for the daemon.
    fn remove_in_background(&self, container: String) {
        let docker = self.docker.clone();
        tokio::spawn(async move {
            let options = BollardRemoveContainerOptionsQuery {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&container, Some(options)).await {
                log::debug!("Background removal of {} failed: {}", container, e);
            }
        });
    }

    async fn remove(&self, container_id: &str) {
        let options = BollardRemoveContainerOptionsQuery {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self
            .docker
            .remove_container(container_id, Some(options))
            .await
        {
            log::warn!("Failed to remove container {}: {}", container_id, e);
        }
    }
}

/// Entrypoint for a step inside the container.
///
/// The final step reads stdin from the staged input file through a tiny shell wrapper,
/// since the file lives in the bind mount.
pub fn container_command(step: &Step) -> Vec<String> {
    let (program, args) = step.resolve(CONTAINER_WORK_DIR);
    if !step.attach_stdin {
        return std::iter::once(program).chain(args).collect();
    }
    let redirect = format!(
        "exec \"$@\" < {}/{}",
        CONTAINER_WORK_DIR, INPUT_FILE_NAME
    );
    ["sh".to_string(), "-c".to_string(), redirect, "sh".to_string(), program]
        .into_iter()
        .chain(args)
        .collect()
}

#[async_trait]
impl CodeExecutor for DockerExecutor {
    fn name(&self) -> &'static str {
        "container"
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
impl StepRunner for DockerExecutor {
    async fn run_step(
        &self,
        pipeline: &Pipeline,
        step: &Step,
        workspace: &Workspace,
        budget: Duration,
    ) -> Result<StepOutcome, EngineError> {
        let config = self.container_config(pipeline, step, workspace)?;
        let name = format!("codepad-{}-{}", workspace.request_id().simple(), step_tag(step));

        let mut outcome = StepOutcome::new(step);
        let start = Instant::now();
        // Container creation and startup count against the step budget.
        let deadline = tokio::time::Instant::now() + budget;

        let container_id =
            match tokio::time::timeout_at(deadline, self.create_and_start(&name, config)).await {
                Ok(Ok(id)) => id,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    log::warn!(
                        "[{}] Container {} did not start within {:?}",
                        workspace.request_id(),
                        name,
                        budget
                    );
                    self.remove_in_background(name);
                    outcome.timed_out = true;
                    outcome.duration = start.elapsed();
                    return Ok(outcome);
                }
            };
        let mut wait_stream = self
            .docker
            .wait_container(&container_id, None::<BollardWaitContainerOptionsQuery>);
        let timeout_future = tokio::time::sleep_until(deadline);

        let wait_outcome = tokio::select! {
            res = wait_stream.next() => Some(res),
            _ = timeout_future => None,
        };

        match wait_outcome {
            Some(Some(Ok(response))) => outcome.exit_code = Some(response.status_code as i32),
            // bollard reports non-zero exits as an error carrying the code
            Some(Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. }))) => {
                outcome.exit_code = Some(code as i32)
            }
            Some(Some(Err(e))) => {
                self.remove(&container_id).await;
                return Err(e.into());
            }
            Some(None) => {
                outcome.spawn_error = Some("Container wait stream ended unexpectedly".to_string());
            }
            None => {
                log::warn!(
                    "[{}] Execution timed out for container {}",
                    workspace.request_id(),
                    container_id
                );
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<BollardKillContainerOptionsQuery>)
                    .await
                {
                    log::warn!("Failed to kill container {}: {}", container_id, e);
                }
                outcome.timed_out = true;
            }
        }
        outcome.duration = start.elapsed();

        // Logs survive the kill, so a timed-out step still reports partial output.
        match self.collect_logs(&container_id).await {
            Ok((stdout, stderr)) => {
                outcome.stdout = stdout;
                outcome.stderr = stderr;
            }
            Err(e) => log::warn!("Failed to collect logs for {}: {}", container_id, e),
        }

        self.remove(&container_id).await;
        Ok(outcome)
    }
}

fn step_tag(step: &Step) -> &'static str {
    match step.kind {
        crate::pipeline::StepKind::Compile => "compile",
        crate::pipeline::StepKind::Run => "run",
    }
}
