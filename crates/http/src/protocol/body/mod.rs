//! Request body handling.
//!
//! A request body is consumed through two cooperating halves:
//!
//! - [`ReqBody`] is the handler-facing half. It implements
//!   [`http_body::Body`] and is either `NoBody` (end-of-stream immediately)
//!   or a channel endpoint that pulls decoded payload items on demand.
//! - `BodySender` is the connection-facing half. It owns a mutable borrow of
//!   the framed reader for the duration of one request cycle, decodes exactly
//!   one payload item per pull signal (backpressure: nothing is read ahead of
//!   the handler), and drains whatever the handler left unread so the stream
//!   ends the cycle at the next message boundary.
//!
//! The `Expect: 100-continue` handshake also lives on the sender side: the
//! sender holds a borrow of the connection writer and emits the interim
//! response exactly once, immediately before servicing the first pull
//! signal. Draining never emits it.

mod body_channel;
mod req_body;

pub use req_body::ReqBody;
