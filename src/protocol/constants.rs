//! Control channel constants

use std::time::Duration;

/// Application protocol negotiated during the TLS handshake
pub const ALPN_PROTOCOL: &[u8] = b"moq-media-url-send";

/// Well-known control channel address
pub const DEFAULT_CONTROL_ADDR: &str = "localhost:4242";

/// Receive bound for a single request or response
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Prefix of assigned publisher names
pub const PUBLISHER_PREFIX: &str = "pub";

/// TLS server name used when dialing the assigner
pub const DEFAULT_SERVER_NAME: &str = "localhost";

/// Default relay broker URL handed to the pipeline clients
pub const DEFAULT_RELAY_URL: &str = "https://localhost:4443";

/// Client keep-alive probe interval
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Idle timeout after which an unanswered connection is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Application error code sent when closing a connection normally
pub const CLOSE_NORMAL: u32 = 0;
