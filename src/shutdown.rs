//! Shutdown coordination
//!
//! Two phases, terminal at `Terminating`:
//!
//! ```text
//!   Running ──(SIGINT / SIGTERM / trigger)──► Terminating
//! ```
//!
//! The transition runs these steps in order, each attempted even if an
//! earlier one failed:
//! 1. stop accepting new connections and streams
//! 2. terminate every managed process
//! 3. close the control channel
//!
//! In-flight exchanges are abandoned, not drained.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::registry::{ProcessSupervisor, TerminationReport};

/// Upper bound on waiting for cancelled tasks to unwind
const TASK_UNWIND_TIMEOUT: Duration = Duration::from_secs(2);

/// Coordinator lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Running = 0,
    Terminating = 1,
}

/// The side of the control channel a coordinator shuts down
pub trait ControlChannel {
    /// Refuse new connections and streams
    fn stop_accepting(&self);

    /// Close open connections; blocked reads and writes fail
    fn close(&self);
}

/// Owns the cancellation token, the task set and the process supervisor
#[derive(Debug)]
pub struct ShutdownCoordinator {
    phase: AtomicU8,
    token: CancellationToken,
    tracker: TaskTracker,
    supervisor: ProcessSupervisor,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self {
            phase: AtomicU8::new(Phase::Running as u8),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            supervisor,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            0 => Phase::Running,
            _ => Phase::Terminating,
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.phase() == Phase::Terminating
    }

    /// Token cancelled on entering `Terminating`
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Task set every control-plane task is spawned on
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Run the transition to `Terminating`
    ///
    /// Returns `None` if the transition already happened.
    pub async fn shutdown<C: ControlChannel + ?Sized>(
        &self,
        control: &C,
    ) -> Option<TerminationReport> {
        let previous = self.phase.swap(Phase::Terminating as u8, Ordering::AcqRel);
        if previous == Phase::Terminating as u8 {
            return None;
        }
        tracing::info!("Terminating...");

        // 1. Stop accepting and let tasks observe the cancellation.
        self.token.cancel();
        control.stop_accepting();
        self.tracker.close();
        if tokio::time::timeout(TASK_UNWIND_TIMEOUT, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Tasks still running after cancellation"
            );
        }

        // 2. Kill every managed process.
        let report = self.supervisor.terminate_all().await;

        // 3. Release the control channel.
        control.close();

        tracing::info!(
            terminated = report.terminated(),
            failed = report.failed(),
            "Shutdown complete"
        );
        Some(report)
    }
}

/// Wait for an interrupt or terminate signal
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Interrupt received"),
        _ = terminate => tracing::info!("Terminate signal received"),
    }
}
