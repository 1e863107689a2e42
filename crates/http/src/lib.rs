//! A wire-level HTTP/1.1 origin server engine.
//!
//! The crate is organized as a per-connection pipeline:
//!
//! - [`codec`]: streaming decoders and encoders over [`bytes::BytesMut`],
//!   built on [`tokio_util::codec`]. Request line and header block are parsed
//!   with `httparse`; bodies are decoded by a fixed-length or chunked payload
//!   decoder selected from the headers.
//! - [`protocol`]: the message types exchanged between codec and connection,
//!   the request body handle given to handlers, and the error hierarchy.
//! - [`connection`]: the keep-alive loop tying a framed reader and writer
//!   together: it runs the handler concurrently with a body pump, drains
//!   unread body bytes so the stream stays at a message boundary, and decides
//!   `Content-Length` versus chunked framing for the response.
//! - [`multipart`] and [`form`]: streaming `multipart/form-data` reading with
//!   a fixed peek window, and form parsing with bounded in-memory buffering
//!   that spills large file parts to temp files.
//! - [`handler`]: the trait a host application implements to serve requests.

pub mod codec;
pub mod connection;
pub mod form;
pub mod handler;
pub mod multipart;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
