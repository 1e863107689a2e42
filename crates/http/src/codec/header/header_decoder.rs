//! Request line and header block decoder.
//!
//! Parsing is delegated to `httparse` over the framed read buffer; a partial
//! parse leaves the buffer untouched so bytes split across socket reads are
//! reassembled transparently. The decoder also derives how the body that
//! follows is framed ([`PayloadSize`]), applying the precedence rules of the
//! wire grammar: `Transfer-Encoding: chunked` wins over `Content-Length`,
//! and without either (or with an unparseable `Content-Length`) the request
//! has no body. Only `POST` and `PUT` may carry a body at all.
//!
//! The request line plus header block is capped at 1 MiB; the cap protects
//! against hostile header streams and does not apply to bodies.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

pub(crate) const MAX_HEADER_NUM: usize = 64;
/// Cap on the request line plus header block, applied to complete and
/// partial parses alike.
pub(crate) const MAX_HEADER_BYTES: usize = 1024 * 1024;

pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut req = httparse::Request::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] =
            unsafe { MaybeUninit::uninit().assume_init() };

        let parsed = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        match parsed {
            Status::Complete(header_size) => {
                trace!(header_size, "parsed request header block");
                ensure!(header_size <= MAX_HEADER_BYTES, ParseError::too_large_header(header_size, MAX_HEADER_BYTES));

                let version = match req.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    v => return Err(ParseError::InvalidVersion(v)),
                };

                let mut builder = Request::builder()
                    .method(req.method.ok_or(ParseError::InvalidMethod)?)
                    .uri(req.path.ok_or(ParseError::InvalidUri)?)
                    .version(version);

                // record name/value offsets before the buffer is split off
                let mut indices: [HeaderIndex; MAX_HEADER_NUM] = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
                let header_count = req.headers.len();
                HeaderIndex::record(src, req.headers, &mut indices);

                let header_bytes = src.split_to(header_size).freeze();
                let headers = builder.headers_mut().expect("request builder is valid");
                headers.reserve(header_count);
                for index in &indices[..header_count] {
                    // httparse validated the name as a token
                    let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1])
                        .expect("httparse produced a valid header name");

                    // SAFETY: httparse only admits visible ASCII plus
                    // obs-text in header values
                    let value = unsafe {
                        HeaderValue::from_maybe_shared_unchecked(header_bytes.slice(index.value.0..index.value.1))
                    };

                    headers.append(name, value);
                }

                let header = RequestHeader::from(builder.body(()).map_err(|_| ParseError::InvalidUri)?);
                let payload_size = parse_payload_size(&header);

                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let base = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - base;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - base;
            index.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Derives the body framing from the request header block.
fn parse_payload_size(header: &RequestHeader) -> PayloadSize {
    if !header.allows_body() {
        return PayloadSize::Empty;
    }

    if is_chunked_coding(header.headers().get(http::header::TRANSFER_ENCODING)) {
        return PayloadSize::Chunked;
    }

    let content_length = header
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    match content_length {
        Some(0) | None => PayloadSize::Empty,
        Some(n) => PayloadSize::Length(n),
    }
}

/// Whether a `Transfer-Encoding` value ends with the `chunked` coding.
pub(crate) fn is_chunked_coding(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|value| value.to_str().ok())
        .and_then(|codings| codings.rsplit(',').next())
        .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Version};
    use indoc::indoc;

    fn decode(input: &str) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        let mut buf = BytesMut::from(input);
        HeaderDecoder.decode(&mut buf)
    }

    #[test]
    fn simple_get() {
        let input = indoc! {"
            GET /a?x=1 HTTP/1.1\r
            Host: h\r
            \r
        "};

        let (header, payload_size) = decode(input).unwrap().unwrap();
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/a");
        assert_eq!(header.uri().query(), Some("x=1"));
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "h");
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn leaves_body_bytes_in_the_buffer() {
        let input = "POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut buf = BytesMut::from(input);

        let (_, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn repeated_headers_accumulate() {
        let input = indoc! {"
            GET / HTTP/1.1\r
            Accept: text/html\r
            Accept: application/json\r
            \r
        "};

        let (header, _) = decode(input).unwrap().unwrap();
        let values: Vec<_> = header.headers().get_all(http::header::ACCEPT).iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "text/html");
        assert_eq!(values[1], "application/json");
    }

    #[test]
    fn partial_header_requests_more_data() {
        let mut buf = BytesMut::from("GET /index.html HTT");
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
        // nothing consumed while partial
        assert_eq!(&buf[..], b"GET /index.html HTT");
    }

    #[test]
    fn transfer_encoding_wins() {
        let input = indoc! {"
            POST /upload HTTP/1.1\r
            Content-Length: 42\r
            Transfer-Encoding: chunked\r
            \r
        "};

        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Chunked);
    }

    #[test]
    fn body_only_for_post_and_put() {
        let input = indoc! {"
            GET / HTTP/1.1\r
            Content-Length: 10\r
            \r
        "};
        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);

        let input = indoc! {"
            PUT /item HTTP/1.1\r
            Content-Length: 10\r
            \r
        "};
        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(10));
    }

    #[test]
    fn unparseable_content_length_means_no_body() {
        let input = indoc! {"
            POST / HTTP/1.1\r
            Content-Length: banana\r
            \r
        "};
        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn zero_content_length_normalizes_to_empty() {
        let input = indoc! {"
            POST / HTTP/1.1\r
            Content-Length: 0\r
            \r
        "};
        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn oversized_partial_header_is_rejected() {
        let mut buf = BytesMut::with_capacity(MAX_HEADER_BYTES + 1024);
        buf.extend_from_slice(b"GET / HTTP/1.1\r\n");
        while buf.len() <= MAX_HEADER_BYTES {
            buf.extend_from_slice(b"X-Filler: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
        }
        // note: no terminating blank line, so the parse is still partial
        let result = HeaderDecoder.decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn bad_request_line_is_rejected() {
        assert!(decode("NOT-A-REQUEST\r\n\r\n").is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let result = decode("GET / HTTP/2.0\r\n\r\n");
        assert!(result.is_err());
    }

    #[test]
    fn chunked_coding_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_chunked_coding(headers.get(http::header::TRANSFER_ENCODING)));

        headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
        assert!(is_chunked_coding(headers.get(http::header::TRANSFER_ENCODING)));

        headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
        assert!(!is_chunked_coding(headers.get(http::header::TRANSFER_ENCODING)));
    }
}
