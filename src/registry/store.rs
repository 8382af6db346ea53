//! Process registry implementation
//!
//! The shared map of launched pipelines. Entries are added by every
//! successful launch and only removed when the whole registry is
//! terminated at shutdown.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::entry::ManagedProcess;
use super::error::{LaunchError, TerminationError};

/// Registry of managed processes keyed by publisher name
///
/// Thread-safe via a single `Mutex`; every handler task registers through
/// the same lock.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    processes: Mutex<HashMap<String, ManagedProcess>>,
}

/// Outcome of terminating every registered process
#[derive(Debug, Default)]
pub struct TerminationReport {
    /// Number of processes a termination was attempted for
    pub attempted: usize,
    /// Processes that could not be terminated
    pub failures: Vec<TerminationError>,
}

impl TerminationReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn terminated(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a launched process under its key
    ///
    /// On a key collision the process is handed back inside the error so the
    /// caller can dispose of it.
    pub async fn register(
        &self,
        process: ManagedProcess,
    ) -> Result<(), (LaunchError, ManagedProcess)> {
        let mut processes = self.processes.lock().await;

        if processes.contains_key(process.key()) {
            let key = process.key().to_string();
            return Err((LaunchError::DuplicateKey(key), process));
        }

        tracing::info!(
            key = %process.key(),
            pids = ?process.pids(),
            registered = processes.len() + 1,
            "Process registered"
        );
        processes.insert(process.key().to_string(), process);

        Ok(())
    }

    /// Check if a process is registered under `key`
    pub async fn contains(&self, key: &str) -> bool {
        self.processes.lock().await.contains_key(key)
    }

    /// Registered keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.processes.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered processes
    pub async fn len(&self) -> usize {
        self.processes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processes.lock().await.is_empty()
    }

    /// Terminate every registered process
    ///
    /// A failure on one process never stops the others from being attempted.
    pub async fn terminate_all(&self) -> TerminationReport {
        let drained: Vec<ManagedProcess> = {
            let mut processes = self.processes.lock().await;
            processes.drain().map(|(_, p)| p).collect()
        };

        let mut report = TerminationReport {
            attempted: drained.len(),
            failures: Vec::new(),
        };

        for mut process in drained {
            tracing::info!(key = %process.key(), pids = ?process.pids(), "Killing process");

            if let Err(source) = process.terminate().await {
                tracing::error!(key = %process.key(), error = %source, "Error killing process");
                report.failures.push(TerminationError {
                    key: process.key().to_string(),
                    source,
                });
            }
        }

        report
    }
}
