//! Channel catalog loaded from persisted per-channel metadata
//!
//! Layout under the catalog root:
//!
//! ```text
//! <root>/channels/<name>/channel.json
//! <root>/channels/<name>/<mirrored>.m3u8   (optional)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

use super::channel::Channel;

/// Directory under the catalog root holding one directory per channel
pub const CHANNELS_DIR: &str = "channels";

/// Metadata file name inside each channel directory
pub const CHANNEL_FILE: &str = "channel.json";

/// Immutable view of the playable channels
///
/// Only channels with at least one resolved media URL are kept.
#[derive(Debug, Clone, Default)]
pub struct ChannelCatalog {
    channels: BTreeMap<String, Channel>,
}

impl ChannelCatalog {
    /// Load every channel directory present under `root`
    ///
    /// Missing or unparsable metadata and channels without media URLs are
    /// logged and skipped. Only a missing `channels/` directory is an error.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let channels_dir = root.as_ref().join(CHANNELS_DIR);
        let entries = fs::read_dir(&channels_dir).map_err(|source| CatalogError::Io {
            path: channels_dir.clone(),
            source,
        })?;

        let mut catalog = Self::default();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            match load_channel(&path) {
                Ok(channel) => {
                    // The directory name is the key other tools use for lookups.
                    let name = entry.file_name().to_string_lossy().into_owned();
                    catalog.insert_named(name, channel);
                }
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "Skipping channel");
                }
            }
        }

        tracing::info!(
            root = %root.as_ref().display(),
            channels = catalog.len(),
            "Channel catalog loaded"
        );

        Ok(catalog)
    }

    /// Build a catalog from in-memory channels, keyed by channel name
    pub fn from_channels<I: IntoIterator<Item = Channel>>(channels: I) -> Self {
        let mut catalog = Self::default();
        for channel in channels {
            catalog.insert_named(channel.name.clone(), channel);
        }
        catalog
    }

    fn insert_named(&mut self, name: String, channel: Channel) {
        if channel.is_playable() {
            self.channels.insert(name, channel);
        } else {
            tracing::debug!(channel = %name, "Channel has no media URLs, excluded");
        }
    }

    /// Look up a channel by name
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Iterate over channels in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Channel)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of playable channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is playable
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Path of a channel's metadata file
pub fn channel_file(root: &Path, name: &str) -> PathBuf {
    root.join(CHANNELS_DIR).join(name).join(CHANNEL_FILE)
}

fn load_channel(dir: &Path) -> Result<Channel, CatalogError> {
    let path = dir.join(CHANNEL_FILE);
    let data = fs::read(&path).map_err(|source| CatalogError::Io {
        path: path.clone(),
        source,
    })?;
    let channel: Channel =
        serde_json::from_slice(&data).map_err(|source| CatalogError::Parse { path, source })?;

    if !channel.is_playable() {
        return Err(CatalogError::NoMediaUrls(channel.name));
    }
    Ok(channel)
}
