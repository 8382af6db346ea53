//! Process supervisor
//!
//! Starts pipelines, registers them, and terminates them at shutdown.
//! Stage output is passed through to this process's own stdout/stderr.
//! A process dropped without being registered is killed.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::pipeline::PipelineCommand;

use super::entry::{ManagedProcess, RunningStage};
use super::error::LaunchError;
use super::store::{ProcessRegistry, TerminationReport};

/// Launches external pipelines and tracks them in a shared registry
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    registry: Arc<ProcessRegistry>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supervisor over an existing registry
    pub fn with_registry(registry: Arc<ProcessRegistry>) -> Self {
        Self { registry }
    }

    /// Get a reference to the process registry
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Start a pipeline without registering it
    ///
    /// Each stage's stdout is connected to the next stage's stdin. If a later
    /// stage fails to start, the stages already running are killed.
    pub fn launch(
        &self,
        key: &str,
        command: &PipelineCommand,
    ) -> Result<ManagedProcess, LaunchError> {
        if command.is_empty() {
            return Err(LaunchError::EmptyPipeline { key: key.into() });
        }

        let last = command.stages().len() - 1;
        let mut running: Vec<RunningStage> = Vec::with_capacity(command.stages().len());
        let mut upstream: Option<Stdio> = None;

        for (i, stage) in command.stages().iter().enumerate() {
            let mut cmd = Command::new(&stage.program);
            cmd.args(&stage.args)
                .stdin(upstream.take().unwrap_or_else(Stdio::null))
                .stdout(if i == last {
                    Stdio::inherit()
                } else {
                    Stdio::piped()
                })
                .stderr(Stdio::inherit())
                .kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(source) => {
                    abort_stages(&mut running);
                    return Err(LaunchError::Spawn {
                        key: key.into(),
                        program: stage.program.clone(),
                        source,
                    });
                }
            };

            if i < last {
                let piped = child
                    .stdout
                    .take()
                    .ok_or_else(|| std::io::Error::other("stdout not captured"))
                    .and_then(|out| out.try_into());
                match piped {
                    Ok(stdio) => upstream = Some(stdio),
                    Err(source) => {
                        let _ = child.start_kill();
                        abort_stages(&mut running);
                        return Err(LaunchError::Pipe {
                            key: key.into(),
                            source,
                        });
                    }
                }
            }

            running.push(RunningStage {
                program: stage.program.clone(),
                child,
            });
        }

        let process = ManagedProcess::new(key.to_string(), running);
        tracing::info!(key = %key, pids = ?process.pids(), command = %command, "Pipeline started");

        Ok(process)
    }

    /// Add a launched process to the registry
    pub async fn register(&self, process: ManagedProcess) -> Result<(), LaunchError> {
        match self.registry.register(process).await {
            Ok(()) => Ok(()),
            Err((err, mut process)) => {
                // An unregistered process could never be cleaned up at shutdown.
                let _ = process.terminate().await;
                Err(err)
            }
        }
    }

    /// Launch and register, logging instead of returning failures
    ///
    /// Returns whether the pipeline is now tracked.
    pub async fn spawn_tracked(&self, key: &str, command: &PipelineCommand) -> bool {
        let result = match self.launch(key, command) {
            Ok(process) => self.register(process).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to launch pipeline");
                false
            }
        }
    }

    /// Terminate every registered process
    pub async fn terminate_all(&self) -> TerminationReport {
        let report = self.registry.terminate_all().await;

        tracing::info!(
            attempted = report.attempted,
            failed = report.failed(),
            "Managed processes terminated"
        );

        report
    }
}

fn abort_stages(running: &mut [RunningStage]) {
    for stage in running {
        let _ = stage.child.start_kill();
    }
}
