//! Playlist ingestion
//!
//! Parses an extended M3U channel list and refreshes the per-channel
//! `channel.json` files from playlists already mirrored into the catalog.
//!
//! ```text
//! #EXTINF:-1 tvg-id="news.one" tvg-logo="http://l/1.png" group-title="News",News One
//! #EXTVLCOPT:http-user-agent=...        (skipped)
//! http://a/live/index.m3u8
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::CatalogError;

use super::channel::Channel;
use super::store::{channel_file, CHANNELS_DIR};

const EXTINF: &str = "#EXTINF:";
const EXTVLCOPT: &str = "#EXTVLCOPT:";
const STREAM_INF: &str = "#EXT-X-STREAM-INF";

fn extinf_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"#EXTINF:-1 tvg-id="(.*)" tvg-logo="(.*)" group-title="(.*)",(.*)"#)
            .expect("EXTINF pattern is valid")
    })
}

/// Parse an extended M3U channel list
///
/// Entries whose URL line is not a valid URL are dropped. Later entries
/// with the same normalized name replace earlier ones.
pub fn parse_channel_list(text: &str) -> BTreeMap<String, Channel> {
    let mut channels = BTreeMap::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        if !line.starts_with(EXTINF) {
            continue;
        }
        let Some(caps) = extinf_regex().captures(line) else {
            continue;
        };

        let Some(url_line) = lines.by_ref().find(|l| !l.starts_with(EXTVLCOPT)) else {
            break;
        };
        let url_line = url_line.trim();

        let Ok(parsed) = Url::parse(url_line) else {
            tracing::debug!(url = %url_line, "Skipping entry with invalid URL");
            continue;
        };

        let mut channel = Channel::new(&caps[4], url_line);
        channel.tvg_id = caps[1].to_string();
        channel.tvg_logo = caps[2].to_string();
        channel.group_title = caps[3].to_string();
        channel.base_url = base_url(&parsed);

        channels.insert(channel.name.clone(), channel);
    }

    channels
}

/// Playlist URL with the last path segment removed
fn base_url(url: &Url) -> String {
    let mut base = url.clone();
    let path = url.path();
    let dir = match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    };
    base.set_path(dir);
    base.to_string()
}

/// Kind of HLS playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlsPlaylist {
    /// Media playlist: the channel's playlist URL is itself the media URL
    Media,
    /// Master playlist listing variant URIs
    Master(Vec<String>),
}

/// Classify an HLS playlist and collect its variant URIs
pub fn parse_hls(text: &str) -> Option<HlsPlaylist> {
    let mut lines = text.lines().map(str::trim);
    if lines.next() != Some("#EXTM3U") {
        return None;
    }

    let mut variants = Vec::new();
    let mut is_master = false;
    let mut expect_uri = false;

    for line in lines {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(STREAM_INF) {
            is_master = true;
            expect_uri = true;
        } else if line.starts_with('#') {
            continue;
        } else if expect_uri {
            variants.push(line.to_string());
            expect_uri = false;
        }
    }

    Some(if is_master {
        HlsPlaylist::Master(variants)
    } else {
        HlsPlaylist::Media
    })
}

/// Resolve a channel's media URLs from its mirrored playlist
pub fn resolve_media_urls(channel: &Channel, playlist: &HlsPlaylist) -> Vec<String> {
    match playlist {
        HlsPlaylist::Media => vec![channel.playlist_url.clone()],
        HlsPlaylist::Master(variants) => {
            // The base URL names a directory even without a trailing slash.
            let base = Url::parse(&format!("{}/", channel.base_url.trim_end_matches('/'))).ok();
            variants
                .iter()
                .filter_map(|uri| {
                    if uri.starts_with("http://") || uri.starts_with("https://") {
                        Some(uri.clone())
                    } else {
                        base.as_ref()
                            .and_then(|b| b.join(uri).ok())
                            .map(|u| u.to_string())
                    }
                })
                .collect()
        }
    }
}

/// Find the mirrored `.m3u8` file in a channel directory
fn mirrored_playlist(dir: &Path) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "m3u8"))
        .collect();
    found.sort();
    found.into_iter().next()
}

/// Write a channel's metadata file
pub fn save_channel(root: &Path, channel: &Channel) -> Result<(), CatalogError> {
    let path = channel_file(root, &channel.name);
    let io_err = |source| CatalogError::Io {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_vec_pretty(channel).map_err(|source| CatalogError::Parse {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(io_err)?;

    tracing::debug!(channel = %channel.name, path = %path.display(), "Channel metadata written");
    Ok(())
}

/// Refresh `channel.json` for every listed channel that is mirrored locally
///
/// The catalog root is the directory holding the channel list. Returns the
/// number of channels written.
pub fn refresh_catalog(playlist_path: &Path) -> Result<usize, CatalogError> {
    let text = fs::read_to_string(playlist_path).map_err(|source| CatalogError::Io {
        path: playlist_path.to_path_buf(),
        source,
    })?;
    let root = playlist_path.parent().unwrap_or_else(|| Path::new("."));
    let listed = parse_channel_list(&text);

    let mut written = 0;
    for (name, mut channel) in listed {
        let dir = root.join(CHANNELS_DIR).join(&name);
        if !dir.is_dir() {
            continue;
        }

        if let Some(path) = mirrored_playlist(&dir) {
            match fs::read_to_string(&path).ok().as_deref().and_then(parse_hls) {
                Some(hls) => channel.media_urls = resolve_media_urls(&channel, &hls),
                None => {
                    let err = CatalogError::Playlist {
                        path,
                        reason: "not an HLS playlist".into(),
                    };
                    tracing::warn!(channel = %name, error = %err, "Cannot resolve media URLs");
                }
            }
        }

        match save_channel(root, &channel) {
            Ok(()) => written += 1,
            Err(e) => tracing::warn!(channel = %name, error = %e, "Failed to save channel"),
        }
    }

    tracing::info!(
        playlist = %playlist_path.display(),
        channels = written,
        "Catalog refreshed"
    );
    Ok(written)
}
