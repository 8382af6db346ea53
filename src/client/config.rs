//! Requester configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::{MediaTools, Readiness};
use crate::protocol::constants::{
    DEFAULT_CONTROL_ADDR, DEFAULT_IDLE_TIMEOUT, DEFAULT_KEEP_ALIVE, DEFAULT_SERVER_NAME,
};

/// Default length of a recording
pub const DEFAULT_RECORD_DURATION: Duration = Duration::from_secs(10);

/// Requester configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Assigner address, `host:port`
    pub server_addr: String,

    /// TLS server name sent in the handshake
    pub server_name: String,

    /// Keep-alive probe interval
    pub keep_alive: Duration,

    /// Idle timeout for the connection
    pub idle_timeout: Duration,

    /// Bound on one request/response exchange (None = wait indefinitely)
    pub request_timeout: Option<Duration>,

    /// External media tools used for the subscribe pipeline
    pub tools: MediaTools,

    /// Directory recordings are written to
    pub output_dir: PathBuf,

    /// Length of each recording
    pub record_duration: Duration,

    /// Wait policy between receiving a name and subscribing
    pub readiness: Readiness,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_CONTROL_ADDR.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            request_timeout: None,
            tools: MediaTools::default(),
            output_dir: PathBuf::from("."),
            record_duration: DEFAULT_RECORD_DURATION,
            readiness: Readiness::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config dialing `addr`
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            server_addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set the TLS server name
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bound each exchange
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn tools(mut self, tools: MediaTools) -> Self {
        self.tools = tools;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn record_duration(mut self, duration: Duration) -> Self {
        self.record_duration = duration;
        self
    }

    pub fn readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.server_addr, "localhost:4242");
        assert_eq!(config.server_name, "localhost");
        assert_eq!(config.keep_alive, Duration::from_secs(1));
        assert!(config.request_timeout.is_none());
        assert_eq!(config.record_duration, Duration::from_secs(10));
        assert!(matches!(
            config.readiness,
            Readiness::Delay(d) if d == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientConfig::new("10.0.0.5:4242")
            .server_name("assigner")
            .request_timeout(Duration::from_secs(5))
            .output_dir("/tmp/recordings")
            .record_duration(Duration::from_secs(30))
            .readiness(Readiness::Delay(Duration::ZERO));

        assert_eq!(config.server_addr, "10.0.0.5:4242");
        assert_eq!(config.server_name, "assigner");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/recordings"));
        assert_eq!(config.record_duration, Duration::from_secs(30));
        assert!(matches!(config.readiness, Readiness::Delay(d) if d.is_zero()));
    }
}
