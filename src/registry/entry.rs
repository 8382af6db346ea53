//! Managed process entry
//!
//! A launched pipeline: one OS process per stage, tracked under the key the
//! remote peer knows it by.

use std::ffi::OsString;
use std::io;
use std::process::ExitStatus;
use std::time::Instant;

use tokio::process::Child;

/// One running stage of a pipeline
#[derive(Debug)]
pub struct RunningStage {
    pub program: OsString,
    pub(super) child: Child,
}

/// An externally spawned pipeline tracked for termination
#[derive(Debug)]
pub struct ManagedProcess {
    key: String,
    stages: Vec<RunningStage>,
    started_at: Instant,
}

impl ManagedProcess {
    pub(super) fn new(key: String, stages: Vec<RunningStage>) -> Self {
        Self {
            key,
            stages,
            started_at: Instant::now(),
        }
    }

    /// Registry key (the publisher name, or `relay`)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// OS process IDs of stages that have not been reaped
    pub fn pids(&self) -> Vec<u32> {
        self.stages.iter().filter_map(|s| s.child.id()).collect()
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// When the pipeline was launched
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wait for every stage to exit, returning the last stage's status
    pub async fn wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let mut last = None;
        for stage in &mut self.stages {
            last = Some(stage.child.wait().await?);
        }
        Ok(last)
    }

    /// Kill every stage, then reap them
    ///
    /// All stages are signalled even if an earlier one fails; the first
    /// failure is returned.
    pub async fn terminate(&mut self) -> io::Result<()> {
        let mut first_error = None;

        for stage in &mut self.stages {
            if let Err(e) = stage.child.start_kill() {
                tracing::debug!(
                    key = %self.key,
                    program = ?stage.program,
                    error = %e,
                    "Kill failed"
                );
                first_error.get_or_insert(e);
            }
        }

        for stage in &mut self.stages {
            let _ = stage.child.wait().await;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
