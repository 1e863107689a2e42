//! Response encoder: one header block, then payload framing.
//!
//! Mirrors [`super::RequestDecoder`] on the write side. Encoding a header
//! installs the payload encoder matching the decided [`PayloadSize`];
//! encoding a second header before the current payload finished is an error,
//! which is what makes "the status line is written at most once per request"
//! a structural invariant rather than a convention.

use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("response header encoded twice for one request");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("payload encoded before the response header");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(item, dst);
                if payload_encoder.is_finished() {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::Response;

    type Msg = Message<(ResponseHead, PayloadSize), Bytes>;

    fn head() -> ResponseHead {
        Response::builder().body(()).unwrap()
    }

    #[test]
    fn fixed_length_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Msg::Header((head(), PayloadSize::Length(5))), &mut dst).unwrap();
        encoder.encode(Msg::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))), &mut dst).unwrap();
        encoder.encode(Msg::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let text = String::from_utf8(dst.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn chunked_response_terminates() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Msg::Header((head(), PayloadSize::Chunked)), &mut dst).unwrap();
        encoder.encode(Msg::Payload(PayloadItem::Chunk(Bytes::from_static(b"hi"))), &mut dst).unwrap();
        encoder.encode(Msg::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let text = String::from_utf8(dst.to_vec()).unwrap();
        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(text.ends_with("2\r\nhi\r\n0\r\n\r\n"));
    }

    #[test]
    fn header_once_per_request() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Msg::Header((head(), PayloadSize::Chunked)), &mut dst).unwrap();
        // payload still open: a second header must fail
        assert!(encoder.encode(Msg::Header((head(), PayloadSize::Empty)), &mut dst).is_err());

        // finishing the payload re-arms the encoder for the next response
        encoder.encode(Msg::Payload(PayloadItem::Eof), &mut dst).unwrap();
        assert!(encoder.encode(Msg::Header((head(), PayloadSize::Empty)), &mut dst).is_ok());
    }
}
