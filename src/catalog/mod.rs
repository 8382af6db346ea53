//! Channel catalog
//!
//! This module provides:
//! - The `Channel` record and its on-disk JSON form
//! - Loading the catalog from `channels/<name>/channel.json`
//! - Refreshing channel metadata from an M3U channel list
//! - Uniform random selection of a channel and media URL

pub mod channel;
pub mod playlist;
pub mod selector;
pub mod store;

pub use channel::{normalize_name, Channel};
pub use playlist::refresh_catalog;
pub use selector::{select_random_media_url, Selection};
pub use store::ChannelCatalog;
