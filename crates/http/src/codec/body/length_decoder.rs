//! Decoder for `Content-Length` framed bodies.

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Counts a fixed number of body bytes off the read buffer.
///
/// The remaining count is monotonically non-increasing; once it reaches zero
/// every further decode yields `Eof` and never touches bytes that belong to
/// the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let take = cmp::min(self.remaining, src.len() as u64) as usize;
        let bytes = src.split_to(take).freeze();
        self.remaining -= take as u64;

        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_the_declared_length() {
        let mut src = BytesMut::from(&b"hello, worldGET /next"[..]);
        let mut decoder = LengthDecoder::new(12);

        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"hello, world");

        // the rest of the buffer belongs to the next request
        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
        assert_eq!(&src[..], b"GET /next");
    }

    #[test]
    fn accumulates_across_reads() {
        let mut decoder = LengthDecoder::new(5);

        let mut src = BytesMut::from(&b"he"[..]);
        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"he");

        assert!(decoder.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"llo");
        let item = decoder.decode(&mut src).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"llo");

        assert!(decoder.decode(&mut src).unwrap().unwrap().is_eof());
    }
}
