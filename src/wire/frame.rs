//! The outer frame: `signature | xid | body_len | body` (`spec.md` §4.1).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// The ASCII literal every frame begins with.
pub const SIGNATURE: &[u8; 5] = b"btRPC";

/// Bodies larger than this are refused and the connection dropped
/// (`spec.md` §4.1).
pub const MAX_BODY_LEN: usize = 18 * 1024;

/// A framed packet: the correlating transaction id and the raw body bytes.
/// Request and response bodies are decoded from / encoded into `body` by
/// [`super::request`] and [`super::response`] respectively.
pub struct Frame {
    pub xid: u32,
    pub body: Vec<u8>,
}

/// Reads one frame, looping past `Interrupted` errors and rejecting bodies
/// over [`MAX_BODY_LEN`]. Any other I/O error, an unrecognized signature,
/// or an oversize body closes the peer per `spec.md` §4.1 / §7.
pub async fn read_frame(stream: &mut (impl AsyncRead + Unpin)) -> Result<Frame> {
    let mut signature = [0u8; 5];
    read_exact_retrying(stream, &mut signature).await?;
    if &signature != SIGNATURE {
        return Err(Error::Protocol);
    }

    let mut xid_buf = [0u8; 4];
    read_exact_retrying(stream, &mut xid_buf).await?;
    let xid = u32::from_le_bytes(xid_buf);

    let mut len_buf = [0u8; 4];
    read_exact_retrying(stream, &mut len_buf).await?;
    let body_len = u32::from_le_bytes(len_buf) as usize;
    if body_len > MAX_BODY_LEN {
        return Err(Error::Protocol);
    }

    let mut body = vec![0u8; body_len];
    read_exact_retrying(stream, &mut body).await?;

    Ok(Frame { xid, body })
}

/// Writes one frame. The whole header+body is built in one buffer and
/// flushed with a single `write_all` so no other writer can interleave a
/// frame in the middle of this one (`spec.md` §4.2: "serialize and send the
/// frame atomically").
pub async fn write_frame(stream: &mut (impl AsyncWrite + Unpin), xid: u32, body: &[u8]) -> Result<()> {
    if body.len() > MAX_BODY_LEN {
        return Err(Error::Protocol);
    }

    let mut out = Vec::with_capacity(5 + 4 + 4 + body.len());
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&xid.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);

    stream.write_all(&out).await.map_err(|_| Error::Protocol)?;
    stream.flush().await.map_err(|_| Error::Protocol)
}

async fn read_exact_retrying(stream: &mut (impl AsyncRead + Unpin), buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]).await {
            Ok(0) => return Err(Error::Protocol),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(Error::Protocol),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 42, b"hello").await.unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.xid, 42);
        assert_eq!(frame.body, b"hello");
    }

    #[tokio::test]
    async fn rejects_bad_signature() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"xxRPC");
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn accepts_body_at_exactly_max_len() {
        let body = vec![0u8; MAX_BODY_LEN];
        let mut buf = Vec::new();
        write_frame(&mut buf, 1, &body).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.body.len(), MAX_BODY_LEN);
    }

    #[tokio::test]
    async fn rejects_body_one_byte_over_max_len() {
        let mut buf = Vec::new();
        buf.extend_from_slice(SIGNATURE);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&((MAX_BODY_LEN + 1) as u32).to_le_bytes());
        buf.extend_from_slice(&vec![0u8; MAX_BODY_LEN + 1]);

        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).await.is_err());
    }
}
