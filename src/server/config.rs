//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::pipeline::MediaTools;
use crate::protocol::constants::DEFAULT_IDLE_TIMEOUT;

/// Assigner server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Maximum concurrent request streams per connection
    pub max_streams_per_connection: u32,

    /// Idle timeout for connections
    pub idle_timeout: Duration,

    /// Keep-alive probe interval (None = rely on the peer's probes)
    pub keep_alive: Option<Duration>,

    /// External media tools used for publish pipelines
    pub tools: MediaTools,

    /// Start the relay broker alongside the server
    pub launch_relay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 4242)),
            max_connections: 0, // Unlimited
            max_streams_per_connection: 100,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            keep_alive: None,
            tools: MediaTools::default(),
            launch_relay: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set maximum concurrent streams per connection
    pub fn max_streams_per_connection(mut self, max: u32) -> Self {
        self.max_streams_per_connection = max.max(1);
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set keep-alive interval
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    /// Set the media tools
    pub fn tools(mut self, tools: MediaTools) -> Self {
        self.tools = tools;
        self
    }

    /// Start the relay broker when the server starts
    pub fn launch_relay(mut self, enabled: bool) -> Self {
        self.launch_relay = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 4242);
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_streams_per_connection, 100);
        assert!(config.keep_alive.is_none());
        assert!(!config.launch_relay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:4343".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 4343);
    }

    #[test]
    fn test_builder_max_streams_floor() {
        let config = ServerConfig::default().max_streams_per_connection(0);

        assert_eq!(config.max_streams_per_connection, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:5000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(8)
            .idle_timeout(Duration::from_secs(5))
            .keep_alive(Duration::from_secs(1))
            .tools(MediaTools::from_moqrs_dir("/srv/moq-rs"))
            .launch_relay(true);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.keep_alive, Some(Duration::from_secs(1)));
        assert_eq!(config.tools.relay.to_str(), Some("/srv/moq-rs/dev/relay"));
        assert!(config.launch_relay);
    }
}
