//! Length-prefixed framing over a byte stream.
//!
//! Three payload kinds are exchanged, all prefixed (or carried) by a 16-bit
//! big-endian integer:
//!
//! - *text frame*: `[u16 len][len bytes of UTF-8]` — commands, usernames,
//!   message bodies;
//! - *integer frame*: a bare `u16` — listen ports and small counts;
//! - *blob frame*: `[u16 len][len raw bytes]` — file-transfer chunks.
//!
//! Payloads are bounded by [`MAX_PAYLOAD`]; there is no fragmentation.
//! Receiving on a cleanly closed connection yields [`WireError::Closed`]
//! rather than blocking.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::MAX_PAYLOAD;
use crate::WireError;

/// Send one text frame.
pub async fn send_text<W>(stream: &mut W, text: &str) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    send_blob(stream, text.as_bytes()).await
}

/// Receive one text frame.
pub async fn recv_text<R>(stream: &mut R) -> Result<String, WireError>
where
    R: AsyncRead + Unpin,
{
    let payload = recv_blob(stream).await?;
    Ok(String::from_utf8(payload)?)
}

/// Send one integer frame. The two length bytes *are* the value.
pub async fn send_u16<W>(stream: &mut W, value: u16) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&value.to_be_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Receive one integer frame.
pub async fn recv_u16<R>(stream: &mut R) -> Result<u16, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 2];
    read_exact_or_closed(stream, &mut buf).await?;
    Ok(u16::from_be_bytes(buf))
}

/// Send one blob frame.
pub async fn send_blob<W>(stream: &mut W, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::TooLarge(payload.len()));
    }

    // Length prefix and payload go out as one buffer so a frame is never
    // split by an interleaved writer on the same stream.
    let mut buf = Vec::with_capacity(2 + payload.len());
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await?;
    stream.flush().await?;
    Ok(())
}

/// Receive one blob frame.
pub async fn recv_blob<R>(stream: &mut R) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    read_exact_or_closed(stream, &mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;
    if len > MAX_PAYLOAD {
        return Err(WireError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    read_exact_or_closed(stream, &mut payload).await?;
    Ok(payload)
}

/// `read_exact` that maps a clean EOF to [`WireError::Closed`].
async fn read_exact_or_closed<R>(stream: &mut R, buf: &mut [u8]) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
{
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(WireError::Closed),
        Err(e) => Err(WireError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        send_text(&mut a, "hello world").await.unwrap();
        let got = recv_text(&mut b).await.unwrap();
        assert_eq!(got, "hello world");
    }

    #[tokio::test]
    async fn text_with_embedded_spaces_is_bit_identical() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let msg = "  spaced   out  message  ";

        send_text(&mut a, msg).await.unwrap();
        assert_eq!(recv_text(&mut b).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn max_length_text_transmits() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let msg = "x".repeat(MAX_PAYLOAD);

        send_text(&mut a, &msg).await.unwrap();
        assert_eq!(recv_text(&mut b).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_writing() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let msg = "x".repeat(MAX_PAYLOAD + 1);

        let err = send_text(&mut a, &msg).await.unwrap_err();
        assert!(matches!(err, WireError::TooLarge(_)));

        // Nothing was written; the receiver sees a clean close once the
        // sender is dropped.
        drop(a);
        assert!(recv_text(&mut b).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn integer_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(64);

        send_u16(&mut a, 4242).await.unwrap();
        send_u16(&mut a, u16::MAX).await.unwrap();
        assert_eq!(recv_u16(&mut b).await.unwrap(), 4242);
        assert_eq!(recv_u16(&mut b).await.unwrap(), u16::MAX);
    }

    #[tokio::test]
    async fn blob_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let chunk: Vec<u8> = (0..=255).cycle().take(1000).collect();

        send_blob(&mut a, &chunk).await.unwrap();
        assert_eq!(recv_blob(&mut b).await.unwrap(), chunk);
    }

    #[tokio::test]
    async fn closed_connection_returns_closed_not_blocks() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        let err = recv_text(&mut b).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn several_frames_on_one_stream_stay_separate() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        send_text(&mut a, "CHT").await.unwrap();
        send_text(&mut a, "alice").await.unwrap();
        send_u16(&mut a, 5001).await.unwrap();

        assert_eq!(recv_text(&mut b).await.unwrap(), "CHT");
        assert_eq!(recv_text(&mut b).await.unwrap(), "alice");
        assert_eq!(recv_u16(&mut b).await.unwrap(), 5001);
    }
}
