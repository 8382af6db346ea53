//! End-to-end control channel tests over a loopback QUIC endpoint
//!
//! External media tools are replaced by `true`, so every pipeline starts
//! and exits immediately.

#![cfg(unix)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use moq_tv_relay::catalog::{Channel, ChannelCatalog};
use moq_tv_relay::client::{record_random_channel, ClientConfig, ControlClient};
use moq_tv_relay::error::TransportError;
use moq_tv_relay::pipeline::{MediaTools, Readiness};
use moq_tv_relay::protocol::constants::ALPN_PROTOCOL;
use moq_tv_relay::registry::ProcessSupervisor;
use moq_tv_relay::server::{AssignerServer, ServerConfig};
use moq_tv_relay::shutdown::ShutdownCoordinator;
use moq_tv_relay::tls::{self, TransportCredential};

struct TestServer {
    coordinator: ShutdownCoordinator,
    server: Arc<AssignerServer>,
    addr: SocketAddr,
    handle: JoinHandle<moq_tv_relay::Result<()>>,
}

impl TestServer {
    async fn shutdown(self) -> moq_tv_relay::registry::TerminationReport {
        let report = self
            .coordinator
            .shutdown(&*self.server)
            .await
            .expect("first shutdown");
        tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("accept loop stops")
            .unwrap()
            .unwrap();
        report
    }
}

fn noop_tools() -> MediaTools {
    MediaTools {
        ffmpeg: "true".into(),
        moq_pub: "true".into(),
        moq_sub: "true".into(),
        relay: "true".into(),
        relay_url: "https://localhost:4443".into(),
    }
}

fn server_config() -> ServerConfig {
    ServerConfig::with_addr(SocketAddr::from(([127, 0, 0, 1], 0))).tools(noop_tools())
}

async fn start_server(config: ServerConfig) -> TestServer {
    let credential = TransportCredential::self_signed(&["localhost"]).unwrap();
    let coordinator = ShutdownCoordinator::new(ProcessSupervisor::new());
    let server = Arc::new(AssignerServer::bind(config, &credential, &coordinator).unwrap());
    let addr = server.local_addr().unwrap();

    let runner = Arc::clone(&server);
    let handle = tokio::spawn(async move { runner.run().await });

    TestServer {
        coordinator,
        server,
        addr,
        handle,
    }
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(addr.to_string())
        .idle_timeout(Duration::from_secs(2))
        .tools(noop_tools())
        .readiness(Readiness::Delay(Duration::ZERO))
}

async fn wait_for_key(server: &AssignerServer, key: &str) -> bool {
    for _ in 0..100 {
        if server.supervisor().registry().contains(key).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_sequential_names_on_one_connection() {
    let server = start_server(server_config()).await;
    let client = ControlClient::connect(&client_config(server.addr))
        .await
        .unwrap();

    let first = client.request_publish("http://a/1.m3u8").await.unwrap();
    let second = client.request_publish("http://b/2.m3u8").await.unwrap();

    assert_eq!(first.name, "pub0");
    assert_eq!(second.name, "pub1");

    server.shutdown().await;
}

#[tokio::test]
async fn test_same_url_is_not_deduplicated() {
    let server = start_server(server_config()).await;
    let client = ControlClient::connect(&client_config(server.addr))
        .await
        .unwrap();

    let a = client.request_publish("http://a/1.m3u8").await.unwrap();
    let b = client.request_publish("http://a/1.m3u8").await.unwrap();

    assert_ne!(a, b);
    assert_eq!(server.server.assigner().assigned(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_names_unique_across_connections() {
    let server = start_server(server_config()).await;

    let mut tasks = Vec::new();
    for i in 0..4 {
        let config = client_config(server.addr);
        tasks.push(tokio::spawn(async move {
            let client = ControlClient::connect(&config).await.unwrap();
            let mut names = Vec::new();
            for j in 0..3 {
                let url = format!("http://host/{i}/{j}.m3u8");
                names.push(client.request_publish(&url).await.unwrap().name);
            }
            names
        }));
    }

    let mut names = Vec::new();
    for task in tasks {
        names.extend(task.await.unwrap());
    }
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 12);

    server.shutdown().await;
}

#[tokio::test]
async fn test_pipeline_registered_under_sent_name() {
    let server = start_server(server_config()).await;
    let client = ControlClient::connect(&client_config(server.addr))
        .await
        .unwrap();

    let assignment = client.request_publish("http://a/1.m3u8").await.unwrap();

    assert!(wait_for_key(&server.server, &assignment.name).await);
    assert!(!server.server.supervisor().registry().contains("pub1").await);

    let report = server.shutdown().await;
    assert_eq!(report.attempted, 1);
}

#[tokio::test]
async fn test_shutdown_terminates_all_and_stops_accepting() {
    let server = start_server(server_config()).await;
    let addr = server.addr;
    let client = ControlClient::connect(&client_config(addr)).await.unwrap();

    for url in ["http://a/1.m3u8", "http://b/2.m3u8"] {
        client.request_publish(url).await.unwrap();
    }
    assert!(wait_for_key(&server.server, "pub1").await);

    let supervisor = server.server.supervisor().clone();
    let report = server.shutdown().await;

    assert_eq!(report.attempted, 2);
    assert!(supervisor.registry().is_empty().await);

    let late = ClientConfig::new(addr.to_string()).idle_timeout(Duration::from_millis(500));
    assert!(ControlClient::connect(&late).await.is_err());
    assert!(client.request_publish("http://c/3.m3u8").await.is_err());
}

#[tokio::test]
async fn test_connection_limit_refuses_extra_peers() {
    let server = start_server(server_config().max_connections(1)).await;

    let first = ControlClient::connect(&client_config(server.addr))
        .await
        .unwrap();
    assert_eq!(first.request_publish("http://a/1.m3u8").await.unwrap().name, "pub0");

    let second = ControlClient::connect(&client_config(server.addr)).await;
    assert!(matches!(second, Err(TransportError::Dial(_))));
    assert_eq!(server.server.stats().refused_connections, 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_record_random_channel() {
    let server = start_server(server_config()).await;
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("recordings");

    let catalog = ChannelCatalog::from_channels([
        Channel::new("NewsOne", "http://example.com/news.m3u8")
            .with_media_urls(["http://example.com/news/720p.m3u8"]),
    ]);
    let config = client_config(server.addr).output_dir(&output_dir);

    let coordinator = ShutdownCoordinator::new(ProcessSupervisor::new());
    let client = ControlClient::connect(&config).await.unwrap();

    let recording = record_random_channel(
        &client,
        &catalog,
        &config,
        coordinator.supervisor(),
        &coordinator.token(),
    )
    .await
    .unwrap();

    assert_eq!(recording.selection.channel, "NewsOne");
    assert_eq!(recording.assignment.name, "pub0");
    assert_eq!(recording.output, output_dir.join("pub0.mp4"));
    assert!(recording.subscribed);
    assert!(output_dir.is_dir());
    assert!(coordinator.supervisor().registry().contains("pub0").await);

    let report = coordinator.shutdown(&client).await.unwrap();
    assert_eq!(report.attempted, 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_record_with_empty_catalog_sends_nothing() {
    let server = start_server(server_config()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = client_config(server.addr).output_dir(dir.path());

    let coordinator = ShutdownCoordinator::new(ProcessSupervisor::new());
    let client = ControlClient::connect(&config).await.unwrap();

    let result = record_random_channel(
        &client,
        &ChannelCatalog::default(),
        &config,
        coordinator.supervisor(),
        &coordinator.token(),
    )
    .await;

    assert!(matches!(result, Err(moq_tv_relay::Error::EmptyCatalog)));
    assert_eq!(server.server.assigner().assigned(), 0);

    coordinator.shutdown(&client).await;
    server.shutdown().await;
}

/// Peer that accepts one request stream and never answers it
async fn silent_server() -> (SocketAddr, JoinHandle<()>) {
    let credential = TransportCredential::self_signed(&["localhost"]).unwrap();
    let transport = tls::transport_config(None, Duration::from_secs(10), 8).unwrap();
    let endpoint = quinn::Endpoint::server(
        credential.server_config(ALPN_PROTOCOL, transport).unwrap(),
        SocketAddr::from(([127, 0, 0, 1], 0)),
    )
    .unwrap();
    let addr = endpoint.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let incoming = endpoint.accept().await.unwrap();
        let connection = incoming.accept().unwrap().await.unwrap();
        let _stream = connection.accept_bi().await.unwrap();
        std::future::pending::<()>().await;
    });

    (addr, handle)
}

#[tokio::test]
async fn test_blocked_request_fails_when_connection_closes() {
    let (addr, silent) = silent_server().await;
    let client = Arc::new(ControlClient::connect(&client_config(addr)).await.unwrap());

    let requester = Arc::clone(&client);
    let pending =
        tokio::spawn(async move { requester.request_publish("http://a/1.m3u8").await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!pending.is_finished());

    let coordinator = ShutdownCoordinator::new(ProcessSupervisor::new());
    coordinator.shutdown(&*client).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("blocked read unblocks")
        .unwrap();
    assert!(result.is_err());

    silent.abort();
}

#[tokio::test]
async fn test_request_timeout() {
    let (addr, silent) = silent_server().await;
    let config = client_config(addr).request_timeout(Duration::from_millis(200));
    let client = ControlClient::connect(&config).await.unwrap();

    let result = client.request_publish("http://a/1.m3u8").await;
    assert!(matches!(result, Err(TransportError::Timeout)));

    silent.abort();
}

async fn raw_connection(addr: SocketAddr) -> (quinn::Endpoint, quinn::Connection) {
    let transport = tls::transport_config(None, Duration::from_secs(2), 0).unwrap();
    let mut endpoint = quinn::Endpoint::client(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    endpoint.set_default_client_config(tls::insecure_client_config(ALPN_PROTOCOL, transport).unwrap());
    let connection = endpoint.connect(addr, "localhost").unwrap().await.unwrap();
    (endpoint, connection)
}

#[tokio::test]
async fn test_requester_that_keeps_stream_open_gets_a_name() {
    let server = start_server(server_config()).await;
    let (_endpoint, connection) = raw_connection(server.addr).await;

    let (mut send, mut recv) = connection.open_bi().await.unwrap();
    send.write_all(b"http://a/1.m3u8").await.unwrap();

    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(3), recv.read(&mut buf))
        .await
        .expect("reply without end of stream")
        .unwrap()
        .unwrap();
    assert_eq!(&buf[..n], b"pub0");
    assert!(wait_for_key(&server.server, "pub0").await);

    drop(send);
    server.shutdown().await;
}

/// Peer that answers each request from one read and never ends its stream
async fn open_ended_server() -> (SocketAddr, JoinHandle<()>) {
    let credential = TransportCredential::self_signed(&["localhost"]).unwrap();
    let transport = tls::transport_config(None, Duration::from_secs(10), 8).unwrap();
    let endpoint = quinn::Endpoint::server(
        credential.server_config(ALPN_PROTOCOL, transport).unwrap(),
        SocketAddr::from(([127, 0, 0, 1], 0)),
    )
    .unwrap();
    let addr = endpoint.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let incoming = endpoint.accept().await.unwrap();
        let connection = incoming.accept().unwrap().await.unwrap();
        let (mut send, mut recv) = connection.accept_bi().await.unwrap();
        let mut buf = [0u8; 4096];
        recv.read(&mut buf).await.unwrap();
        send.write_all(b"pub0").await.unwrap();
        std::future::pending::<()>().await;
    });

    (addr, handle)
}

#[tokio::test]
async fn test_client_reads_reply_from_open_stream() {
    let (addr, peer) = open_ended_server().await;
    let config = client_config(addr).request_timeout(Duration::from_secs(3));
    let client = ControlClient::connect(&config).await.unwrap();

    let assignment = client.request_publish("http://a/1.m3u8").await.unwrap();
    assert_eq!(assignment.name, "pub0");

    peer.abort();
}
