//! Encoder for chunked transfer-coding.
//!
//! Each payload item becomes one or more `size-hex CRLF data CRLF` frames;
//! the `Eof` item emits the `0\r\n\r\n` terminator exactly once. Data larger
//! than [`MAX_CHUNK_SIZE`] is split so a single oversized buffer never
//! produces a single oversized chunk on the wire.

use std::io::Write;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

/// Upper bound for one encoded chunk's data section. Matches the response
/// staging buffer, so a body that overflowed the staging buffer is emitted
/// as at least two chunks.
pub(crate) const MAX_CHUNK_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    /// Set once the terminator has been written.
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false }
    }

    /// True once the final zero-length chunk has been emitted.
    pub fn is_finished(&self) -> bool {
        self.eof
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut data) => {
                while data.has_remaining() {
                    let len = std::cmp::min(data.remaining(), MAX_CHUNK_SIZE);
                    write!(FmtWriter(dst), "{len:x}\r\n")?;
                    dst.reserve(len + 2);
                    let mut written = 0;
                    while written < len {
                        let piece = data.chunk();
                        let take = std::cmp::min(piece.len(), len - written);
                        dst.extend_from_slice(&piece[..take]);
                        data.advance(take);
                        written += take;
                    }
                    dst.extend_from_slice(b"\r\n");
                }
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

/// Adapts `BytesMut` to `io::Write` for formatting the hex size line.
struct FmtWriter<'a>(&'a mut BytesMut);

impl Write for FmtWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
