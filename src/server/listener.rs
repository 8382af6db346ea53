//! Assigner server listener
//!
//! Runs the QUIC accept loop. Each connection gets its own task, and each
//! bidirectional stream on it gets a handler in that task's `JoinSet`. For
//! each completed exchange the connection task hands the publish launch to
//! the shutdown tracker and goes back to accepting streams.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::{Connection, ConnectionError, Endpoint, Incoming, RecvStream, SendStream, VarInt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{Result, TransportError};
use crate::pipeline::MediaTools;
use crate::protocol::constants::{ALPN_PROTOCOL, CLOSE_NORMAL};
use crate::registry::ProcessSupervisor;
use crate::server::assigner::PublisherAssigner;
use crate::server::config::ServerConfig;
use crate::server::exchange::{handle_exchange, Exchange};
use crate::shutdown::{ControlChannel, ShutdownCoordinator};
use crate::stats::{ServerMetrics, ServerStats};
use crate::tls::{self, TransportCredential};

/// Registry key of the relay broker
pub const RELAY_KEY: &str = "relay";

/// QUIC server answering publish requests with publisher names
pub struct AssignerServer {
    config: ServerConfig,
    endpoint: Endpoint,
    assigner: Arc<PublisherAssigner>,
    metrics: Arc<ServerMetrics>,
    supervisor: ProcessSupervisor,
    token: CancellationToken,
    tracker: TaskTracker,
    connection_semaphore: Option<Arc<Semaphore>>,
}

/// State shared by the tasks serving one connection
#[derive(Clone)]
struct ConnectionContext {
    assigner: Arc<PublisherAssigner>,
    metrics: Arc<ServerMetrics>,
    supervisor: ProcessSupervisor,
    tools: MediaTools,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl AssignerServer {
    /// Bind the listening endpoint
    ///
    /// Connection tasks are spawned on the coordinator's tracker and stop on
    /// its token; launched pipelines go into its supervisor's registry.
    pub fn bind(
        config: ServerConfig,
        credential: &TransportCredential,
        coordinator: &ShutdownCoordinator,
    ) -> Result<Self> {
        let transport = tls::transport_config(
            config.keep_alive,
            config.idle_timeout,
            config.max_streams_per_connection,
        )?;
        let server_config = credential.server_config(ALPN_PROTOCOL, transport)?;
        let endpoint = Endpoint::server(server_config, config.bind_addr)
            .map_err(|e| TransportError::Listen(format!("{}: {e}", config.bind_addr)))?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config,
            endpoint,
            assigner: Arc::new(PublisherAssigner::new()),
            metrics: Arc::new(ServerMetrics::new()),
            supervisor: coordinator.supervisor().clone(),
            token: coordinator.token(),
            tracker: coordinator.tracker().clone(),
            connection_semaphore,
        })
    }

    /// Address the endpoint is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    pub fn assigner(&self) -> &Arc<PublisherAssigner> {
        &self.assigner
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Get server statistics
    pub fn stats(&self) -> ServerStats {
        self.metrics.snapshot()
    }

    /// Run the server
    ///
    /// Returns once the shutdown token is cancelled or the endpoint closes.
    /// Fails only if the relay broker is enabled and cannot be started.
    pub async fn run(&self) -> Result<()> {
        if self.config.launch_relay {
            let relay = self.supervisor.launch(RELAY_KEY, &self.config.tools.relay())?;
            self.supervisor.register(relay).await?;
        }

        tracing::info!(
            addr = %self.local_addr()?,
            "Assigner server listening"
        );

        loop {
            let incoming = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                incoming = self.endpoint.accept() => match incoming {
                    Some(incoming) => incoming,
                    None => break,
                },
            };
            self.handle_incoming(incoming);
        }

        tracing::debug!("Accept loop stopped");
        Ok(())
    }

    fn handle_incoming(&self, incoming: Incoming) {
        let peer = incoming.remote_address();

        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer, "Connection rejected: limit reached");
                    self.metrics.connection_refused();
                    incoming.refuse();
                    return;
                }
            }
        } else {
            None
        };

        let ctx = ConnectionContext {
            assigner: Arc::clone(&self.assigner),
            metrics: Arc::clone(&self.metrics),
            supervisor: self.supervisor.clone(),
            tools: self.config.tools.clone(),
            token: self.token.clone(),
            tracker: self.tracker.clone(),
        };

        let connecting = match incoming.accept() {
            Ok(connecting) => connecting,
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Failed to accept connection");
                return;
            }
        };

        self.tracker.spawn(async move {
            let _permit = permit;

            let connection = tokio::select! {
                _ = ctx.token.cancelled() => return,
                connecting = connecting => match connecting {
                    Ok(connection) => connection,
                    Err(e) => {
                        tracing::debug!(peer = %peer, error = %e, "Handshake failed");
                        return;
                    }
                },
            };

            tracing::debug!(
                connection_id = connection.stable_id(),
                peer = %peer,
                "New connection"
            );

            ctx.metrics.connection_opened();
            ctx.serve(connection).await;
            ctx.metrics.connection_closed();

            tracing::debug!(peer = %peer, "Connection closed");
        });
    }
}

impl ConnectionContext {
    async fn serve(&self, connection: Connection) {
        let mut streams = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                accepted = connection.accept_bi() => match accepted {
                    Ok((send, recv)) => {
                        let ctx = self.clone();
                        streams.spawn(async move { ctx.handle_stream(send, recv).await });
                    }
                    Err(e) => {
                        log_connection_end(&connection, &e);
                        break;
                    }
                },
                Some(joined) = streams.join_next(), if !streams.is_empty() => {
                    self.on_stream_done(joined);
                }
            }
        }

        if self.token.is_cancelled() {
            streams.abort_all();
        }
        while let Some(joined) = streams.join_next().await {
            self.on_stream_done(joined);
        }
    }

    async fn handle_stream(&self, mut send: SendStream, mut recv: RecvStream) -> Option<Exchange> {
        let stream_id = recv.id();

        match handle_exchange(&mut recv, &mut send, &self.assigner).await {
            Ok(exchange) => {
                self.metrics.request_served();
                Some(exchange)
            }
            Err(e) => {
                self.metrics.stream_error();
                tracing::warn!(stream = %stream_id, error = %e, "Exchange failed");
                None
            }
        }
    }

    fn on_stream_done(&self, joined: std::result::Result<Option<Exchange>, JoinError>) {
        match joined {
            Ok(Some(exchange)) => {
                let ctx = self.clone();
                self.tracker
                    .spawn(async move { ctx.launch_publisher(exchange).await });
            }
            Ok(None) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!(error = %e, "Stream handler panicked"),
        }
    }

    /// Start the publish pipeline under the name just sent to the peer
    async fn launch_publisher(&self, exchange: Exchange) {
        if self.token.is_cancelled() {
            tracing::debug!(name = %exchange.assignment, "Skipping launch during shutdown");
            return;
        }

        let name = exchange.assignment.name.as_str();
        let command = self.tools.publish(&exchange.request.media_url, name);
        if !self.supervisor.spawn_tracked(name, &command).await {
            self.metrics.launch_failed();
        }
    }
}

fn log_connection_end(connection: &Connection, error: &ConnectionError) {
    match error {
        ConnectionError::ApplicationClosed(_)
        | ConnectionError::LocallyClosed
        | ConnectionError::TimedOut => {
            tracing::debug!(connection_id = connection.stable_id(), reason = %error, "Connection ended");
        }
        _ => {
            tracing::warn!(connection_id = connection.stable_id(), error = %error, "Connection error");
        }
    }
}

impl ControlChannel for AssignerServer {
    fn stop_accepting(&self) {
        self.endpoint.set_server_config(None);
    }

    fn close(&self) {
        self.endpoint
            .close(VarInt::from_u32(CLOSE_NORMAL), b"server shutting down");
    }
}
