//! Part transfer framing
//!
//! One frame carries one named payload:
//!
//! ```text
//! u32 nameLength | nameUTF8 | u32 payloadLength | payload
//! ```
//!
//! Integers are big-endian. Payloads are written in bounded chunks so a
//! slow peer never holds a giant buffer in flight, and read back with
//! however many socket reads the declared length requires.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum length of a part name on the wire.
pub const MAX_NAME_LEN: usize = 1024;

/// Maximum payload size on the wire. Generous for MIDI files.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Default chunk size for payload writes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Errors during frame encoding, sending, or receiving.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Part name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("Invalid UTF-8 in part name")]
    InvalidName,
    #[error("Stream ended mid-frame while reading {0}")]
    Truncated(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single part transfer: a name and the file bytes it labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFrame {
    pub name: String,
    pub payload: Bytes,
}

impl PartFrame {
    /// Create a frame, validating the wire limits up front.
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let name = name.into();
        let payload = payload.into();

        if name.len() > MAX_NAME_LEN {
            return Err(ProtocolError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        Ok(Self { name, payload })
    }

    /// Serialize the complete frame to a contiguous buffer.
    ///
    /// Useful for tests and for peers that buffer whole messages; the
    /// streaming path is [`PartFrame::write_to`].
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8 + self.name.len() + self.payload.len());
        buf.put_u32(self.name.len() as u32);
        buf.put_slice(self.name.as_bytes());
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Write the frame with the default chunk size.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        self.write_chunked(writer, DEFAULT_CHUNK_SIZE).await
    }

    /// Write the frame, streaming the payload in `chunk_size` slices.
    ///
    /// `write_all` retries short writes with the remaining bytes until each
    /// chunk is fully flushed or the socket reports an unrecoverable error.
    pub async fn write_chunked<W>(
        &self,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let chunk_size = chunk_size.max(1);

        let mut header = BytesMut::with_capacity(8 + self.name.len());
        header.put_u32(self.name.len() as u32);
        header.put_slice(self.name.as_bytes());
        header.put_u32(self.payload.len() as u32);
        writer.write_all(&header).await?;

        for chunk in self.payload.chunks(chunk_size) {
            writer.write_all(chunk).await?;
        }
        writer.flush().await?;

        Ok(())
    }

    /// Read one frame, erroring if the stream ends anywhere inside it.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        Self::read_next(reader)
            .await?
            .ok_or(ProtocolError::Truncated("name length"))
    }

    /// Read the next frame from a stream of back-to-back frames.
    ///
    /// Returns `Ok(None)` on a clean end of stream (EOF before the first
    /// byte of a frame). EOF anywhere inside a frame is a
    /// [`ProtocolError::Truncated`].
    pub async fn read_next<R>(reader: &mut R) -> Result<Option<Self>, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        // First length field by hand: a zero-byte read here is a clean end
        // of stream, not a truncated frame.
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = reader.read(&mut len_buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ProtocolError::Truncated("name length"));
            }
            filled += n;
        }
        let name_len = u32::from_be_bytes(len_buf) as usize;
        if name_len > MAX_NAME_LEN {
            return Err(ProtocolError::NameTooLong {
                len: name_len,
                max: MAX_NAME_LEN,
            });
        }

        let mut name_buf = vec![0u8; name_len];
        read_field(reader, &mut name_buf, "name").await?;
        let name = String::from_utf8(name_buf).map_err(|_| ProtocolError::InvalidName)?;

        let mut len_buf = [0u8; 4];
        read_field(reader, &mut len_buf, "payload length").await?;
        let payload_len = u32::from_be_bytes(len_buf) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload_len,
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut payload = vec![0u8; payload_len];
        read_field(reader, &mut payload, "payload").await?;

        Ok(Some(Self {
            name,
            payload: Bytes::from(payload),
        }))
    }
}

/// `read_exact`, with EOF mapped to the frame-level truncation error.
async fn read_field<R>(
    reader: &mut R,
    buf: &mut [u8],
    field: &'static str,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    reader.read_exact(buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated(field)
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_layout_is_big_endian() {
        let frame = PartFrame::new("ab", vec![0x90u8, 0x3C, 0x64]).unwrap();
        let bytes = frame.encode();

        assert_eq!(&bytes[0..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[4..6], b"ab");
        assert_eq!(&bytes[6..10], &[0, 0, 0, 3]);
        assert_eq!(&bytes[10..], &[0x90, 0x3C, 0x64]);
    }

    #[test]
    fn rejects_oversized_name() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let err = PartFrame::new(name, vec![]).unwrap_err();
        assert!(matches!(err, ProtocolError::NameTooLong { .. }));
    }

    #[tokio::test]
    async fn roundtrip_through_duplex() {
        let (mut client, mut server) = tokio::io::duplex(256);

        let frame = PartFrame::new("moonlight-0.mid", vec![7u8; 10_000]).unwrap();
        let send = frame.clone();
        let writer = tokio::spawn(async move { send.write_to(&mut server).await });

        let received = PartFrame::read_from(&mut client).await.unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(received, frame);
    }

    #[tokio::test]
    async fn roundtrip_with_tiny_chunks() {
        let (mut client, mut server) = tokio::io::duplex(16);

        let frame = PartFrame::new("p", vec![0xAAu8; 1000]).unwrap();
        let send = frame.clone();
        let writer = tokio::spawn(async move { send.write_chunked(&mut server, 3).await });

        let received = PartFrame::read_from(&mut client).await.unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(received.payload, frame.payload);
    }

    #[tokio::test]
    async fn back_to_back_frames() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let a = PartFrame::new("song-0.mid", vec![1u8; 32]).unwrap();
        let b = PartFrame::new("song-1.mid", vec![2u8; 64]).unwrap();
        let (sa, sb) = (a.clone(), b.clone());
        let writer = tokio::spawn(async move {
            sa.write_to(&mut server).await?;
            sb.write_to(&mut server).await?;
            // Dropping the writer closes the stream
            Ok::<_, ProtocolError>(())
        });

        let first = PartFrame::read_next(&mut client).await.unwrap();
        let second = PartFrame::read_next(&mut client).await.unwrap();
        let end = PartFrame::read_next(&mut client).await.unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(first, Some(a));
        assert_eq!(second, Some(b));
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn truncated_payload_is_an_error() {
        let (mut client, server) = tokio::io::duplex(1024);

        let frame = PartFrame::new("song-0.mid", vec![9u8; 100]).unwrap();
        let encoded = frame.encode();
        {
            use tokio::io::AsyncWriteExt;
            let mut server = server;
            // Cut the stream 10 bytes short of the declared payload length
            server.write_all(&encoded[..encoded.len() - 10]).await.unwrap();
        }

        let err = PartFrame::read_from(&mut client).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated("payload")));
    }

    #[tokio::test]
    async fn oversized_payload_length_rejected_before_allocation() {
        let (mut client, server) = tokio::io::duplex(1024);

        {
            use tokio::io::AsyncWriteExt;
            let mut server = server;
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&1u32.to_be_bytes());
            bytes.push(b'x');
            bytes.extend_from_slice(&(u32::MAX).to_be_bytes());
            server.write_all(&bytes).await.unwrap();
        }

        let err = PartFrame::read_from(&mut client).await.unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn empty_payload_is_valid() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let frame = PartFrame::new("empty.mid", Vec::new()).unwrap();
        let send = frame.clone();
        tokio::spawn(async move { send.write_to(&mut server).await });

        let received = PartFrame::read_from(&mut client).await.unwrap();
        assert_eq!(received, frame);
    }
}
