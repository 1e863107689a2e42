//! Encoder for `Content-Length` framed bodies.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

/// Copies body bytes through verbatim, up to the declared content length.
///
/// Bytes past the declared length are dropped with a warning rather than
/// corrupting the framing of the next response on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
    saw_eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, saw_eof: false }
    }

    /// True once the declared number of bytes has been written and the body
    /// reported its end.
    pub fn is_finished(&self) -> bool {
        self.remaining == 0 && self.saw_eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut data) => {
                if !data.has_remaining() {
                    return Ok(());
                }

                let len = data.remaining() as u64;
                if len > self.remaining {
                    warn!(extra = len - self.remaining, "body produced more bytes than its declared content-length");
                }

                let take = std::cmp::min(len, self.remaining) as usize;
                dst.reserve(take);
                let mut written = 0;
                while written < take {
                    let piece = data.chunk();
                    let n = std::cmp::min(piece.len(), take - written);
                    dst.extend_from_slice(&piece[..n]);
                    data.advance(n);
                    written += n;
                }
                self.remaining -= take as u64;
                Ok(())
            }
            PayloadItem::Eof => {
                self.saw_eof = true;
                Ok(())
            }
        }
    }
}
