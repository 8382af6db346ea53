//! Random channel and media URL selection

use rand::seq::IteratorRandom;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

use super::store::ChannelCatalog;

/// A channel and one of its media URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub channel: String,
    pub media_url: String,
}

/// Pick a uniformly random channel, then a uniformly random media URL in it
pub fn select_random_media_url(catalog: &ChannelCatalog) -> Result<Selection> {
    select_with_rng(catalog, &mut rand::thread_rng())
}

/// Selection with a caller-provided random source
pub fn select_with_rng<R: Rng + ?Sized>(catalog: &ChannelCatalog, rng: &mut R) -> Result<Selection> {
    let (name, channel) = catalog
        .iter()
        .filter(|(_, c)| c.is_playable())
        .choose(rng)
        .ok_or(Error::EmptyCatalog)?;

    let media_url = channel.media_urls.choose(rng).ok_or(Error::EmptyCatalog)?;

    Ok(Selection {
        channel: name.to_string(),
        media_url: media_url.clone(),
    })
}
