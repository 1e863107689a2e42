//! Request decoder: header parsing then payload streaming.
//!
//! The decoder is a two-phase state machine. While no payload decoder is
//! installed it parses request heads; once a head with a body is decoded it
//! installs the matching [`PayloadDecoder`] and yields payload items until
//! `Eof`, at which point the next decode call parses the next request head.
//! Because the payload decoders stop exactly at their framing boundary, the
//! read buffer always sits at the start of the next request line between
//! messages, which is what keep-alive framing depends on.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    /// `Some` while the current request's body is being streamed.
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // body finished; back to header parsing
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                // bodiless requests go straight back to header parsing
                if !payload_size.is_empty() {
                    self.payload_decoder = Some(payload_size.into());
                }
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}
