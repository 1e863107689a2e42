//! Response status line and header block encoder.
//!
//! The framing headers are not trusted from the handler: whatever the
//! connection decided as [`PayloadSize`] is forced into `Content-Length` or
//! `Transfer-Encoding` so the header block always matches the payload bytes
//! that follow.

use bytes::{BufMut, BytesMut};
use http::{header, Version};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, ResponseHead, SendError};

const INIT_HEADER_SIZE: usize = 4 * 1024;

pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 => {
                dst.put_slice(b"HTTP/1.1 ");
                dst.put_slice(head.status().as_str().as_bytes());
                dst.put_slice(b" ");
                dst.put_slice(head.status().canonical_reason().unwrap_or("Unknown").as_bytes());
                dst.put_slice(b"\r\n");
            }
            v => {
                error!(http_version = ?v, "unsupported response version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        match payload_size {
            PayloadSize::Length(n) => {
                head.headers_mut().insert(header::CONTENT_LENGTH, n.into());
                head.headers_mut().remove(header::TRANSFER_ENCODING);
            }
            PayloadSize::Chunked => {
                head.headers_mut().insert(header::TRANSFER_ENCODING, HeaderEncoder::chunked_value());
                head.headers_mut().remove(header::CONTENT_LENGTH);
            }
            PayloadSize::Empty => {
                head.headers_mut().insert(header::CONTENT_LENGTH, 0.into());
                head.headers_mut().remove(header::TRANSFER_ENCODING);
            }
        }

        for (name, value) in head.headers().iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

impl HeaderEncoder {
    fn chunked_value() -> http::HeaderValue {
        http::HeaderValue::from_static("chunked")
    }
}
