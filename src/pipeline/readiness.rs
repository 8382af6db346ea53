//! Readiness wait before subscribing
//!
//! The relay gives no signal when a publisher becomes available. A fixed
//! delay is the default; a probe turns the delay into an upper bound.

use std::ffi::OsString;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::{sleep, Instant};

/// Default delay before subscribing to a fresh publisher
pub const DEFAULT_SUBSCRIBE_DELAY: Duration = Duration::from_secs(3);

/// Checks whether a publisher is available on the relay
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self, name: &str) -> bool;
}

/// Probe that runs an external program with the publisher name appended
///
/// Exit status zero means ready.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandProbe {
    pub fn new<I, A>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ReadinessProbe for CommandProbe {
    async fn is_ready(&self, name: &str) -> bool {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!(error = %e, "Readiness probe failed to run");
                false
            }
        }
    }
}

/// How long to wait before starting the subscribe pipeline
#[derive(Clone)]
pub enum Readiness {
    /// Sleep for a fixed time
    Delay(Duration),

    /// Poll a probe until it reports ready or `max_wait` elapses
    Probe {
        probe: Arc<dyn ReadinessProbe>,
        interval: Duration,
        max_wait: Duration,
    },
}

/// How a readiness wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Fixed delay elapsed
    Elapsed,
    /// Probe reported ready
    Ready,
    /// Probe never reported ready within the bound
    TimedOut,
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Delay(DEFAULT_SUBSCRIBE_DELAY)
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Delay(d) => f.debug_tuple("Delay").field(d).finish(),
            Readiness::Probe {
                interval, max_wait, ..
            } => f
                .debug_struct("Probe")
                .field("interval", interval)
                .field("max_wait", max_wait)
                .finish_non_exhaustive(),
        }
    }
}

impl Readiness {
    /// Probe-based wait bounded by `max_wait`
    pub fn probe(probe: impl ReadinessProbe + 'static, interval: Duration, max_wait: Duration) -> Self {
        Readiness::Probe {
            probe: Arc::new(probe),
            interval,
            max_wait,
        }
    }

    /// Wait until `name` is expected to be available
    pub async fn wait(&self, name: &str) -> ReadyOutcome {
        match self {
            Readiness::Delay(delay) => {
                sleep(*delay).await;
                ReadyOutcome::Elapsed
            }
            Readiness::Probe {
                probe,
                interval,
                max_wait,
            } => {
                let deadline = Instant::now() + *max_wait;
                loop {
                    if probe.is_ready(name).await {
                        return ReadyOutcome::Ready;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        return ReadyOutcome::TimedOut;
                    }
                    sleep((*interval).min(deadline - now)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct CountingProbe {
        calls: AtomicU32,
        ready_after: u32,
    }

    #[async_trait]
    impl ReadinessProbe for CountingProbe {
        async fn is_ready(&self, _name: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.ready_after
        }
    }

    #[tokio::test]
    async fn test_fixed_delay() {
        let start = Instant::now();
        let outcome = Readiness::Delay(Duration::from_millis(20)).wait("pub0").await;

        assert_eq!(outcome, ReadyOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_probe_ready() {
        let readiness = Readiness::probe(
            CountingProbe {
                calls: AtomicU32::new(0),
                ready_after: 3,
            },
            Duration::from_millis(5),
            Duration::from_secs(5),
        );

        assert_eq!(readiness.wait("pub0").await, ReadyOutcome::Ready);
    }

    #[tokio::test]
    async fn test_probe_bounded() {
        let readiness = Readiness::probe(
            CountingProbe {
                calls: AtomicU32::new(0),
                ready_after: u32::MAX,
            },
            Duration::from_millis(5),
            Duration::from_millis(40),
        );

        let start = Instant::now();
        assert_eq!(readiness.wait("pub0").await, ReadyOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_probe() {
        assert!(CommandProbe::new("true", Vec::<OsString>::new()).is_ready("pub0").await);
        assert!(!CommandProbe::new("false", Vec::<OsString>::new()).is_ready("pub0").await);
        assert!(!CommandProbe::new("/nonexistent/probe", Vec::<OsString>::new())
            .is_ready("pub0")
            .await);
    }
}
