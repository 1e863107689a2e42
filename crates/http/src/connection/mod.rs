//! Per-connection request/response processing.
//!
//! [`HttpConnection`] drives the keep-alive loop for one TCP connection:
//! decode a request head, run the handler while pumping its body on demand,
//! drain whatever the handler left unread, then serialize the response with
//! the framing decided from the body itself. The connection terminates on
//! decode errors, write errors, handler panics, or when the request asked
//! for `Connection: close` (or predates HTTP/1.1 keep-alive).

mod http_connection;

pub use http_connection::HttpConnection;
