//! moq-tv-relay
//!
//! Server mode assigns publisher names and publishes the requested channels
//! into the relay. Client mode picks a random channel, requests it and
//! records it from the relay.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use moq_tv_relay::catalog::{refresh_catalog, ChannelCatalog};
use moq_tv_relay::client::{record_random_channel, ClientConfig, ControlClient};
use moq_tv_relay::pipeline::{MediaTools, Readiness, DEFAULT_SUBSCRIBE_DELAY};
use moq_tv_relay::protocol::constants::{DEFAULT_CONTROL_ADDR, DEFAULT_RELAY_URL};
use moq_tv_relay::registry::ProcessSupervisor;
use moq_tv_relay::server::{AssignerServer, ServerConfig};
use moq_tv_relay::shutdown::{wait_for_signal, ShutdownCoordinator};
use moq_tv_relay::tls::TransportCredential;

const CLIENT_PLAYLIST_USAGE: &str =
    "Usage for client: <program> --client --playlist <path to playlist>";
const CLIENT_OUTPUT_USAGE: &str =
    "Usage for client: <program> --client --output-dir <path to output directory>";
const SERVER_USAGE: &str = "Usage for server: <program> --moqrs-dir <path to moq-rs directory>";

/// Bound on flushing the client's connection close
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Relay random live-TV channels through a MoQ relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run as client
    #[arg(long)]
    client: bool,

    /// Path to the playlist (client)
    #[arg(long)]
    playlist: Option<PathBuf>,

    /// Path to the output directory (client)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Refresh channel metadata from the playlist before selecting (client)
    #[arg(long)]
    update: bool,

    /// Path to the moq-rs directory (required for server, default ~/moq-rs for client)
    #[arg(long)]
    moqrs_dir: Option<PathBuf>,

    /// Control channel address
    #[arg(long, default_value = DEFAULT_CONTROL_ADDR, env = "MOQ_TV_ADDR")]
    addr: String,

    /// Relay URL passed to moq-pub and moq-sub
    #[arg(long, default_value = DEFAULT_RELAY_URL)]
    relay_url: String,

    /// Seconds to wait between receiving a name and subscribing (client)
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBE_DELAY.as_secs())]
    subscribe_delay: u64,

    /// Seconds to record (client)
    #[arg(long, default_value_t = 10)]
    record_secs: u64,

    /// Give up on a request after this many seconds (client, default: wait)
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Do not start the relay broker (server)
    #[arg(long)]
    no_relay: bool,

    /// PEM certificate chain (server, default: self-signed)
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// PEM private key (server)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);

    if args.client {
        let Some(playlist) = args.playlist.clone() else {
            println!("{CLIENT_PLAYLIST_USAGE}");
            return Ok(());
        };
        let Some(output_dir) = args.output_dir.clone() else {
            println!("{CLIENT_OUTPUT_USAGE}");
            return Ok(());
        };
        run_client(&args, &playlist, output_dir).await
    } else {
        let Some(moqrs_dir) = args.moqrs_dir.clone() else {
            println!("{SERVER_USAGE}");
            return Ok(());
        };
        run_server(&args, &moqrs_dir).await
    }
}

fn setup_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn media_tools(args: &Args, moqrs_dir: Option<&Path>) -> MediaTools {
    let tools = match moqrs_dir {
        Some(dir) => MediaTools::from_moqrs_dir(dir),
        None => MediaTools::default(),
    };
    tools.relay_url(args.relay_url.clone())
}

async fn run_server(args: &Args, moqrs_dir: &Path) -> anyhow::Result<()> {
    let bind_addr = tokio::net::lookup_host(&args.addr)
        .await
        .with_context(|| format!("invalid address {}", args.addr))?
        .find(SocketAddr::is_ipv4)
        .with_context(|| format!("no IPv4 address for {}", args.addr))?;

    let credential = match (&args.cert, &args.key) {
        (Some(cert), Some(key)) => TransportCredential::from_pem_files(cert, key)?,
        _ => TransportCredential::self_signed(&["localhost"])?,
    };

    let config = ServerConfig::with_addr(bind_addr)
        .tools(media_tools(args, Some(moqrs_dir)))
        .launch_relay(!args.no_relay);

    let coordinator = ShutdownCoordinator::new(ProcessSupervisor::new());
    let server = AssignerServer::bind(config, &credential, &coordinator)?;

    let result = tokio::select! {
        result = server.run() => result,
        _ = wait_for_signal() => Ok(()),
    };

    coordinator.shutdown(&server).await;

    let stats = server.stats();
    tracing::info!(
        connections = stats.total_connections,
        requests = stats.requests_served,
        stream_errors = stats.stream_errors,
        launch_failures = stats.launch_failures,
        uptime_secs = stats.uptime.as_secs(),
        "Server stopped"
    );

    result.context("assigner server failed")
}

async fn run_client(args: &Args, playlist: &Path, output_dir: PathBuf) -> anyhow::Result<()> {
    if args.update {
        let written = refresh_catalog(playlist)
            .with_context(|| format!("failed to refresh {}", playlist.display()))?;
        tracing::info!(channels = written, "Channel metadata refreshed");
    }

    let root = playlist.parent().unwrap_or_else(|| Path::new("."));
    let catalog = ChannelCatalog::load(root)
        .with_context(|| format!("failed to load channels next to {}", playlist.display()))?;
    tracing::info!(channels = catalog.len(), "Catalog loaded");

    let mut config = ClientConfig::new(args.addr.clone())
        .tools(media_tools(args, args.moqrs_dir.as_deref()))
        .output_dir(output_dir)
        .record_duration(Duration::from_secs(args.record_secs))
        .readiness(Readiness::Delay(Duration::from_secs(args.subscribe_delay)));
    if let Some(secs) = args.request_timeout {
        config = config.request_timeout(Duration::from_secs(secs));
    }

    let coordinator = ShutdownCoordinator::new(ProcessSupervisor::new());
    let client = ControlClient::connect(&config).await?;
    let token = coordinator.token();

    let recorded = tokio::select! {
        recorded = record_random_channel(&client, &catalog, &config, coordinator.supervisor(), &token) => Some(recorded),
        _ = wait_for_signal() => None,
    };

    let result = match recorded {
        Some(Ok(recording)) => {
            tracing::info!(
                channel = %recording.selection.channel,
                name = %recording.assignment,
                output = %recording.output.display(),
                "Waiting for signal"
            );
            wait_for_signal().await;
            Ok(())
        }
        Some(Err(e)) => Err(e),
        None => Ok(()),
    };

    coordinator.shutdown(&client).await;
    let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, client.wait_idle()).await;

    result.context("recording request failed")
}
