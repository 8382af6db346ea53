//! Random channel recording
//!
//! Picks a channel, asks the assigner to publish it, then records the
//! publisher from the relay once it is expected to be available.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::catalog::{select_random_media_url, ChannelCatalog, Selection};
use crate::error::Result;
use crate::pipeline::{recording_path, ReadyOutcome};
use crate::protocol::PublishAssignment;
use crate::registry::ProcessSupervisor;

use super::config::ClientConfig;
use super::requester::ControlClient;

/// Outcome of one recording request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub selection: Selection,
    pub assignment: PublishAssignment,
    /// File the subscribe pipeline writes to
    pub output: PathBuf,
    /// Whether the subscribe pipeline is running and registered
    pub subscribed: bool,
}

/// Request a random channel and start recording it
///
/// A failed subscribe launch is logged and reported in `subscribed`; the
/// publish request itself still succeeded. Cancelling `token` during the
/// readiness wait skips the launch.
pub async fn record_random_channel(
    client: &ControlClient,
    catalog: &ChannelCatalog,
    config: &ClientConfig,
    supervisor: &ProcessSupervisor,
    token: &CancellationToken,
) -> Result<Recording> {
    let selection = select_random_media_url(catalog)?;
    tracing::info!(
        channel = %selection.channel,
        url = %selection.media_url,
        "Selected channel"
    );

    tokio::fs::create_dir_all(&config.output_dir).await?;

    let assignment = client.request_publish(&selection.media_url).await?;
    let name = assignment.name.clone();
    let output = recording_path(&config.output_dir, &name);

    let outcome = tokio::select! {
        outcome = config.readiness.wait(&name) => Some(outcome),
        _ = token.cancelled() => None,
    };

    let subscribed = match outcome {
        None => {
            tracing::debug!(name = %name, "Shutdown during readiness wait");
            false
        }
        Some(outcome) => {
            if outcome == ReadyOutcome::TimedOut {
                tracing::warn!(name = %name, "Publisher not reported ready, subscribing anyway");
            }
            let command =
                config
                    .tools
                    .subscribe(&name, &config.output_dir, config.record_duration);
            supervisor.spawn_tracked(&name, &command).await
        }
    };

    if subscribed {
        tracing::info!(name = %name, output = %output.display(), "Recording started");
    }

    Ok(Recording {
        selection,
        assignment,
        output,
        subscribed,
    })
}
