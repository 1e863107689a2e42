//! Decoder for chunked transfer-coding.
//!
//! Accepts the strict chunk grammar `HEX CRLF data CRLF ... 0 CRLF CRLF`.
//! Size lines contain hexadecimal digits only (`0-9a-fA-F`); a `;` (chunk
//! extension), trailer field, or any other stray byte is a protocol error.
//! Eof is reported only after the final `0\r\n\r\n` has been fully consumed,
//! which keeps a keep-alive connection positioned at the next request line.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

/// Streaming chunked-body decoder.
///
/// Operates byte-at-a-time on the framing bytes and hands chunk data out in
/// whatever pieces the read buffer currently holds, so a chunk split across
/// socket reads surfaces as multiple `Chunk` items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    /// Bytes of the current chunk that have not been handed out yet.
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating the hex size line.
    Size,
    /// Expecting LF after the size line CR.
    SizeLf,
    /// Handing out chunk data.
    Data,
    /// Expecting CR after chunk data.
    DataCr,
    /// Expecting LF after chunk data.
    DataLf,
    /// Expecting the CR of the terminating blank line.
    EndCr,
    /// Expecting the LF of the terminating blank line.
    EndLf,
    /// Terminator fully consumed.
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, remaining: 0 }
    }

    fn push_size_digit(&mut self, digit: u8) -> Result<(), ParseError> {
        self.remaining = self
            .remaining
            .checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_chunk("chunk size overflows u64"))?;
        Ok(())
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Done => {
                    trace!("chunked body fully consumed");
                    return Ok(Some(PayloadItem::Eof));
                }

                State::Data => {
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                        continue;
                    }
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let take = std::cmp::min(self.remaining, src.len() as u64) as usize;
                    let bytes = src.split_to(take).freeze();
                    self.remaining -= take as u64;
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                    }
                    trace!(len = bytes.len(), "decoded chunk data");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                // every remaining state consumes exactly one byte
                _ => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.split_to(1)[0];

                    self.state = match (self.state, byte) {
                        (State::Size, b @ b'0'..=b'9') => {
                            self.push_size_digit(b - b'0')?;
                            State::Size
                        }
                        (State::Size, b @ b'a'..=b'f') => {
                            self.push_size_digit(b - b'a' + 10)?;
                            State::Size
                        }
                        (State::Size, b @ b'A'..=b'F') => {
                            self.push_size_digit(b - b'A' + 10)?;
                            State::Size
                        }
                        (State::Size, b'\r') => State::SizeLf,
                        (State::Size, b';') => {
                            return Err(ParseError::invalid_chunk("chunk extensions are not supported"));
                        }
                        (State::Size, _) => {
                            return Err(ParseError::invalid_chunk("invalid byte in chunk size line"));
                        }

                        (State::SizeLf, b'\n') => {
                            if self.remaining == 0 {
                                // last chunk: only the terminating CRLF may follow
                                State::EndCr
                            } else {
                                State::Data
                            }
                        }
                        (State::SizeLf, _) => {
                            return Err(ParseError::invalid_chunk("missing LF after chunk size"));
                        }

                        (State::DataCr, b'\r') => State::DataLf,
                        (State::DataCr, _) => {
                            return Err(ParseError::invalid_chunk("missing CRLF after chunk data"));
                        }
                        (State::DataLf, b'\n') => State::Size,
                        (State::DataLf, _) => {
                            return Err(ParseError::invalid_chunk("missing CRLF after chunk data"));
                        }

                        (State::EndCr, b'\r') => State::EndLf,
                        (State::EndCr, _) => {
                            return Err(ParseError::invalid_chunk("trailers are not supported"));
                        }
                        (State::EndLf, b'\n') => State::Done,
                        (State::EndLf, _) => {
                            return Err(ParseError::invalid_chunk("malformed chunked body terminator"));
                        }

                        (State::Data | State::Done, _) => unreachable!("handled above"),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn collect(decoder: &mut ChunkedDecoder, src: &mut BytesMut) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        loop {
            match decoder.decode(src).unwrap() {
                Some(PayloadItem::Chunk(bytes)) => out.extend_from_slice(&bytes),
                Some(PayloadItem::Eof) => return (out, true),
                None => return (out, false),
            }
        }
    }

    #[test]
    fn single_chunk() {
        let mut src = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let (data, eof) = collect(&mut decoder, &mut src);
        assert!(eof);
        assert_eq!(data, b"1234567890abcdef");
        assert!(src.is_empty());
    }

    #[test]
    fn multiple_chunks_concatenate() {
        let mut src = BytesMut::from(&b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let (data, eof) = collect(&mut decoder, &mut src);
        assert!(eof);
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn split_across_reads() {
        let payload = b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        // feed the input one byte at a time: decoded bytes must be identical
        let mut decoder = ChunkedDecoder::new();
        let mut src = BytesMut::new();
        let mut out = Vec::new();
        let mut saw_eof = false;

        for &b in payload.iter() {
            src.extend_from_slice(&[b]);
            loop {
                match decoder.decode(&mut src).unwrap() {
                    Some(PayloadItem::Chunk(bytes)) => out.extend_from_slice(&bytes),
                    Some(PayloadItem::Eof) => {
                        saw_eof = true;
                        break;
                    }
                    None => break,
                }
            }
        }

        assert!(saw_eof);
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn partial_chunk_is_handed_out_early() {
        let mut src = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"hel"));

        src.extend_from_slice(b"lo\r\n0\r\n\r\n");
        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"lo"));

        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
    }

    #[test]
    fn uppercase_hex_accepted() {
        let mut src = BytesMut::from(&b"A\r\n0123456789\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();
        let (data, eof) = collect(&mut decoder, &mut src);
        assert!(eof);
        assert_eq!(data, b"0123456789");
    }

    #[test]
    fn non_hex_size_rejected() {
        let mut src = BytesMut::from(&b"xyz\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut src).is_err());
    }

    #[test]
    fn chunk_extension_rejected() {
        let mut src = BytesMut::from(&b"5;name=value\r\nhello\r\n0\r\n\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut src).is_err());
    }

    #[test]
    fn trailer_rejected() {
        let mut src = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: v\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"hello"));
        assert!(decoder.decode(&mut src).is_err());
    }

    #[test]
    fn missing_crlf_after_data_rejected() {
        let mut src = BytesMut::from(&b"5\r\nhelloXX"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"hello"));
        assert!(decoder.decode(&mut src).is_err());
    }

    #[test]
    fn size_overflow_rejected() {
        let mut src = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut src).is_err());
    }

    #[test]
    fn zero_only_body() {
        let mut src = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();
        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
        assert!(src.is_empty());
    }
}
