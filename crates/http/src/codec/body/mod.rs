//! Body payload codecs.
//!
//! Decoding and encoding of HTTP message bodies in the two supported
//! framings: fixed length (`Content-Length`) and chunked transfer-coding.
//! [`PayloadDecoder`] and [`PayloadEncoder`] are tagged unions over the
//! concrete strategies so the request decoder and response encoder can treat
//! all bodies uniformly.
//!
//! Chunk grammar is the strict subset used on the wire here:
//! `HEX CRLF data CRLF ... 0 CRLF CRLF`, with no chunk extensions and no
//! trailers.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
