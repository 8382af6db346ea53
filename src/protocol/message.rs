//! Control channel messages
//!
//! Both messages travel as raw bytes with no length prefix or version
//! field. The sender finishes its half of the stream after writing, so the
//! end of the stream delimits the message.

use bytes::Bytes;

use crate::error::TransportError;

use super::constants::{MAX_MESSAGE_SIZE, PUBLISHER_PREFIX};

/// Request to publish a media URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub media_url: String,
}

impl PublishRequest {
    pub fn new(media_url: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
        }
    }

    /// Encode as the raw URL bytes
    pub fn encode(&self) -> Result<Bytes, TransportError> {
        encode_bounded(&self.media_url)
    }

    /// Decode from the bytes of one stream
    pub fn decode(data: &[u8]) -> Result<Self, TransportError> {
        let media_url = decode_utf8(data)?;
        if media_url.is_empty() {
            return Err(TransportError::Malformed("empty media URL".into()));
        }
        Ok(Self { media_url })
    }
}

/// Publisher identity assigned to exactly one request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublishAssignment {
    pub name: String,
}

impl PublishAssignment {
    /// Assignment for counter value `n`
    pub fn from_counter(n: u64) -> Self {
        Self {
            name: format!("{PUBLISHER_PREFIX}{n}"),
        }
    }

    /// Counter value embedded in the name, if it has the `pub<integer>` form
    pub fn index(&self) -> Option<u64> {
        self.name.strip_prefix(PUBLISHER_PREFIX)?.parse().ok()
    }

    pub fn encode(&self) -> Result<Bytes, TransportError> {
        encode_bounded(&self.name)
    }

    /// Decode and validate a `pub<integer>` identity
    pub fn decode(data: &[u8]) -> Result<Self, TransportError> {
        let assignment = Self {
            name: decode_utf8(data)?,
        };
        if assignment.index().is_none() {
            return Err(TransportError::Malformed(format!(
                "invalid publisher name {:?}",
                assignment.name
            )));
        }
        Ok(assignment)
    }
}

impl std::fmt::Display for PublishAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn encode_bounded(text: &str) -> Result<Bytes, TransportError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            limit: MAX_MESSAGE_SIZE,
        });
    }
    Ok(Bytes::copy_from_slice(text.as_bytes()))
}

fn decode_utf8(data: &[u8]) -> Result<String, TransportError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            limit: MAX_MESSAGE_SIZE,
        });
    }
    String::from_utf8(data.to_vec()).map_err(|e| TransportError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_raw_url() {
        let request = PublishRequest::new("http://a/1.m3u8");
        assert_eq!(&request.encode().unwrap()[..], b"http://a/1.m3u8");
        assert_eq!(PublishRequest::decode(b"http://a/1.m3u8").unwrap(), request);
    }

    #[test]
    fn test_request_rejects_empty_and_oversized() {
        assert!(matches!(
            PublishRequest::decode(b""),
            Err(TransportError::Malformed(_))
        ));

        let long = "x".repeat(MAX_MESSAGE_SIZE + 1);
        assert!(matches!(
            PublishRequest::new(long).encode(),
            Err(TransportError::MessageTooLarge { limit: MAX_MESSAGE_SIZE })
        ));
    }

    #[test]
    fn test_assignment_name() {
        let assignment = PublishAssignment::from_counter(7);
        assert_eq!(assignment.name, "pub7");
        assert_eq!(assignment.index(), Some(7));
        assert_eq!(assignment.to_string(), "pub7");
    }

    #[test]
    fn test_assignment_decode_validates() {
        assert_eq!(PublishAssignment::decode(b"pub12").unwrap().index(), Some(12));
        assert!(PublishAssignment::decode(b"sub1").is_err());
        assert!(PublishAssignment::decode(b"pub").is_err());
        assert!(PublishAssignment::decode(&[0xff, 0xfe]).is_err());
    }
}
