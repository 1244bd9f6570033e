//! Timeout-guarded frame I/O over an async byte stream.
//!
//! Both the server and the client read and write frames the same way: a
//! fixed-size header read, then (if `payload_len > 0`) an exact-size payload
//! read, each bounded by [`IO_TIMEOUT`]. This lives here rather than in
//! `ceqp-server`/`ceqp-client` so the two sides can't drift apart.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::{ProtocolError, Result},
    frame::{Frame, FrameHeader, HEADER_SIZE},
};

/// Idle timeout applied to each blocking read or write.
///
/// A frame is read in two such operations (header, then payload), so a
/// slow peer can take up to `2 * IO_TIMEOUT` to deliver one frame before
/// the session is torn down.
pub const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Read one frame from `stream`, applying [`IO_TIMEOUT`] to the header read
/// and again to the payload read (only if the header declares a non-zero
/// payload).
///
/// # Errors
///
/// [`ProtocolError::Timeout`] if either read doesn't complete in time,
/// [`ProtocolError::Io`] on a socket error (a clean EOF surfaces as an
/// `UnexpectedEof` I/O error from the underlying read call), or any frame
/// decode error from [`FrameHeader::parse`]/[`Frame::from_parts`].
pub async fn read_frame<S>(stream: &mut S) -> Result<Frame>
where
    S: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    timeout(stream.read_exact(&mut header_buf)).await?;

    let header = FrameHeader::parse(&header_buf)?;

    let payload = if header.payload_len == 0 {
        Bytes::new()
    } else {
        let mut payload_buf = vec![0u8; header.payload_len as usize];
        timeout(stream.read_exact(&mut payload_buf)).await?;
        Bytes::from(payload_buf)
    };

    Frame::from_parts(header, payload)
}

/// Encode and write `frame` to `stream`, applying [`IO_TIMEOUT`] to the
/// write.
///
/// # Errors
///
/// [`ProtocolError::PayloadTooLarge`] if the frame's payload exceeds the
/// wire limit, [`ProtocolError::Timeout`] if the write doesn't complete in
/// time, or [`ProtocolError::Io`] on a socket error.
pub async fn write_frame<S>(stream: &mut S, frame: &Frame) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let wire = frame.encode()?;
    timeout(stream.write_all(&wire)).await?;
    timeout(stream.flush()).await?;
    Ok(())
}

/// Run `fut` under [`IO_TIMEOUT`], flattening a tokio elapsed-timeout error
/// and an inner I/O error into the same [`ProtocolError`] variant space.
async fn timeout<F, T>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(IO_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::debug!("socket I/O error: {err}");
            Err(ProtocolError::from(err))
        },
        Err(_elapsed) => {
            tracing::debug!("socket I/O timed out after {IO_TIMEOUT:?}");
            Err(ProtocolError::Timeout(IO_TIMEOUT))
        },
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn writes_and_reads_back_a_frame() {
        let (mut a, mut b) = duplex(4096);
        let frame = Frame::new(0x10, 99, vec![1, 2, 3, 4, 5]);

        write_frame(&mut a, &frame).await.unwrap();
        let received = read_frame(&mut b).await.unwrap();

        assert_eq!(received.header.request_id, 99);
        assert_eq!(received.payload, frame.payload);
    }

    #[tokio::test]
    async fn empty_payload_round_trips() {
        let (mut a, mut b) = duplex(4096);
        let frame = Frame::new(0x01, 1, Vec::new());

        write_frame(&mut a, &frame).await.unwrap();
        let received = read_frame(&mut b).await.unwrap();

        assert_eq!(received.payload.len(), 0);
    }

    #[tokio::test]
    async fn read_times_out_on_silent_peer() {
        tokio::time::pause();
        let (_a, mut b) = duplex(4096);

        let read = tokio::spawn(async move { read_frame(&mut b).await });
        tokio::time::advance(IO_TIMEOUT + Duration::from_millis(1)).await;

        let result = read.await.unwrap();
        assert_eq!(result.unwrap_err(), ProtocolError::Timeout(IO_TIMEOUT));
    }

    #[tokio::test]
    async fn closed_stream_is_an_io_error_not_a_decode_error() {
        let (a, mut b) = duplex(4096);
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
    }
}
