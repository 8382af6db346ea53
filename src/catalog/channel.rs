//! Channel record
//!
//! The on-disk `channel.json` format uses PascalCase keys, so existing
//! catalogs written by other tools load without conversion.

use serde::{Deserialize, Serialize};

/// A named live-media source with its resolved media URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Channel {
    /// Unique channel name (slashes replaced by underscores)
    pub name: String,

    /// URL of the channel's own playlist
    #[serde(rename = "PlaylistURL", default)]
    pub playlist_url: String,

    /// Playlist URL with its last path segment removed
    #[serde(rename = "BaseURL", default)]
    pub base_url: String,

    /// Resolved media variant URLs, in playlist order
    #[serde(rename = "MediaURLs", default, deserialize_with = "null_as_empty")]
    pub media_urls: Vec<String>,

    #[serde(rename = "TvgID", default)]
    pub tvg_id: String,

    #[serde(default)]
    pub tvg_logo: String,

    #[serde(default)]
    pub group_title: String,
}

impl Channel {
    /// Create a channel with a normalized name and no media URLs yet
    pub fn new(name: &str, playlist_url: impl Into<String>) -> Self {
        Self {
            name: normalize_name(name),
            playlist_url: playlist_url.into(),
            ..Default::default()
        }
    }

    /// Set the media URLs
    pub fn with_media_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.media_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the channel can be selected
    pub fn is_playable(&self) -> bool {
        !self.media_urls.is_empty()
    }
}

/// Normalize a channel name so it is usable as a directory name
pub fn normalize_name(name: &str) -> String {
    name.replace('/', "_")
}

// Catalogs written by Go tooling serialize an empty slice as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("News/Sports 24"), "News_Sports 24");
        assert_eq!(normalize_name("Plain"), "Plain");
    }

    #[test]
    fn test_deserialize_channel_json() {
        let json = r#"{
            "Name": "NewsOne",
            "PlaylistURL": "http://a/index.m3u8",
            "BaseURL": "http://a",
            "MediaURLs": ["http://a/1.m3u8", "http://a/2.m3u8"],
            "TvgID": "news.one",
            "TvgLogo": "http://a/logo.png",
            "GroupTitle": "News"
        }"#;

        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.name, "NewsOne");
        assert_eq!(channel.playlist_url, "http://a/index.m3u8");
        assert_eq!(channel.media_urls.len(), 2);
        assert_eq!(channel.tvg_id, "news.one");
        assert_eq!(channel.group_title, "News");
        assert!(channel.is_playable());
    }

    #[test]
    fn test_null_media_urls() {
        let json = r#"{"Name": "Empty", "PlaylistURL": "", "BaseURL": "", "MediaURLs": null}"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert!(channel.media_urls.is_empty());
        assert!(!channel.is_playable());
    }

    #[test]
    fn test_serialize_keys() {
        let channel = Channel::new("A/B", "http://x/p.m3u8").with_media_urls(["http://x/1"]);
        let value = serde_json::to_value(&channel).unwrap();

        assert_eq!(value["Name"], "A_B");
        assert_eq!(value["PlaylistURL"], "http://x/p.m3u8");
        assert_eq!(value["MediaURLs"][0], "http://x/1");
        assert!(value.get("TvgLogo").is_some());
    }
}
