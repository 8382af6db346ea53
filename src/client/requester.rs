//! Publish requester
//!
//! Dials the assigner once and runs one exchange per bidirectional stream
//! on that connection. The request is written without ending the stream and
//! the reply is taken from a single read.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use quinn::{Connection, Endpoint, VarInt};

use crate::error::TransportError;
use crate::protocol::constants::{ALPN_PROTOCOL, CLOSE_NORMAL};
use crate::protocol::{PublishAssignment, PublishRequest};
use crate::server::exchange::{read_message, write_message};
use crate::shutdown::ControlChannel;
use crate::tls;

use super::config::ClientConfig;

/// Connection to an assigner server
///
/// # Example
/// ```no_run
/// use moq_tv_relay::client::{ClientConfig, ControlClient};
///
/// # async fn example() -> moq_tv_relay::error::Result<()> {
/// let client = ControlClient::connect(&ClientConfig::new("localhost:4242")).await?;
/// let assignment = client.request_publish("http://example.com/live.m3u8").await?;
/// println!("publishing as {assignment}");
/// # Ok(())
/// # }
/// ```
pub struct ControlClient {
    endpoint: Endpoint,
    connection: Connection,
    request_timeout: Option<Duration>,
}

impl ControlClient {
    /// Dial the assigner named in `config`
    pub async fn connect(config: &ClientConfig) -> Result<Self, TransportError> {
        let addr = resolve(&config.server_addr).await?;

        let bind_addr = if addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        let mut endpoint =
            Endpoint::client(bind_addr).map_err(|e| TransportError::Dial(e.to_string()))?;

        // The server never opens streams toward the requester.
        let transport = tls::transport_config(Some(config.keep_alive), config.idle_timeout, 0)?;
        endpoint.set_default_client_config(tls::insecure_client_config(ALPN_PROTOCOL, transport)?);

        let connection = endpoint
            .connect(addr, &config.server_name)
            .map_err(|e| TransportError::Dial(format!("{addr}: {e}")))?
            .await
            .map_err(|e| TransportError::Dial(format!("{addr}: {e}")))?;

        tracing::info!(server = %addr, "Connected to assigner");

        Ok(Self {
            endpoint,
            connection,
            request_timeout: config.request_timeout,
        })
    }

    /// Address of the assigner
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Send `media_url` and wait for the assigned publisher name
    ///
    /// Without a request timeout this waits as long as the connection lives.
    pub async fn request_publish(
        &self,
        media_url: &str,
    ) -> Result<PublishAssignment, TransportError> {
        let exchange = self.exchange(media_url);

        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => exchange.await,
        }
    }

    async fn exchange(&self, media_url: &str) -> Result<PublishAssignment, TransportError> {
        let payload = PublishRequest::new(media_url).encode()?;

        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;

        write_message(&mut send, &payload).await?;
        tracing::debug!(url = %media_url, "Sent publish request");

        let reply = read_message(&mut recv).await?;
        // The server has already answered; a failed finish changes nothing.
        let _ = send.finish();
        let assignment = PublishAssignment::decode(&reply)?;
        tracing::info!(name = %assignment, "Received publisher name");

        Ok(assignment)
    }

    /// Wait for the close to reach the server
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

impl ControlChannel for ControlClient {
    fn stop_accepting(&self) {
        // Nothing is accepted on the requester side.
    }

    fn close(&self) {
        self.connection
            .close(VarInt::from_u32(CLOSE_NORMAL), b"client shutting down");
        self.endpoint
            .close(VarInt::from_u32(CLOSE_NORMAL), b"client shutting down");
    }
}

/// Resolve `host:port`, preferring IPv4
async fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| TransportError::InvalidAddress(format!("{addr}: {e}")))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| TransportError::InvalidAddress(addr.to_string()))
}
