//! One-shot request/assignment exchange
//!
//! Runs over any split byte stream; on the server it is a QUIC
//! bidirectional stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;
use crate::protocol::constants::MAX_MESSAGE_SIZE;
use crate::protocol::{PublishAssignment, PublishRequest};

use super::assigner::PublisherAssigner;

/// Result of one completed exchange, handed back to the connection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub request: PublishRequest,
    pub assignment: PublishAssignment,
}

/// Read one message: whatever a single read returns
///
/// There is no end-of-message marker, so the peer may keep its send side
/// open while it waits for the reply. Fails with `MessageTooLarge` when the
/// read yields more than `MAX_MESSAGE_SIZE` bytes.
pub async fn read_message<R>(recv: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; MAX_MESSAGE_SIZE + 1];
    let n = recv
        .read(&mut buf)
        .await
        .map_err(|e| TransportError::Stream(e.to_string()))?;

    if n > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            limit: MAX_MESSAGE_SIZE,
        });
    }
    buf.truncate(n);
    Ok(buf)
}

/// Write one message without ending the stream
pub async fn write_message<W>(send: &mut W, data: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    send.write_all(data)
        .await
        .map_err(|e| TransportError::Stream(e.to_string()))?;
    send.flush()
        .await
        .map_err(|e| TransportError::Stream(e.to_string()))
}

/// Serve one request: read the media URL, assign a name, write it back
///
/// The request is taken from one read; the requester does not have to
/// finish its side first. The reply ends the server's send side. A name is
/// only consumed once a well-formed request has been read.
pub async fn handle_exchange<R, W>(
    recv: &mut R,
    send: &mut W,
    assigner: &PublisherAssigner,
) -> Result<Exchange, TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let data = read_message(recv).await?;
    let request = PublishRequest::decode(&data)?;
    tracing::info!(url = %request.media_url, "Received publish request");

    let assignment = assigner.assign();
    write_message(send, &assignment.encode()?).await?;
    send.shutdown()
        .await
        .map_err(|e| TransportError::Stream(e.to_string()))?;
    tracing::debug!(name = %assignment, "Sent name to client");

    Ok(Exchange {
        request,
        assignment,
    })
}
