//! Statistics for the assigner server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide counters, updated concurrently by connection tasks
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    connections: AtomicU64,
    active_connections: AtomicU64,
    refused_connections: AtomicU64,
    requests: AtomicU64,
    stream_errors: AtomicU64,
    launch_failures: AtomicU64,
}

/// Point-in-time copy of the server counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Total connections accepted
    pub total_connections: u64,
    /// Connections currently open
    pub active_connections: u64,
    /// Connections refused by the connection limit
    pub refused_connections: u64,
    /// Requests answered with a publisher name
    pub requests_served: u64,
    /// Streams that failed before an answer was written
    pub stream_errors: u64,
    /// Publish pipelines that failed to start
    pub launch_failures: u64,
    /// Uptime
    pub uptime: Duration,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            refused_connections: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            stream_errors: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
        }
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_refused(&self) {
        self.refused_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_served(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn launch_failed(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            refused_connections: self.refused_connections.load(Ordering::Relaxed),
            requests_served: self.requests.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
            launch_failures: self.launch_failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}
