//! Request-header decoding and response-header encoding.

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;

pub(crate) use header_decoder::is_chunked_coding;
