//! The application-facing request handler contract.
//!
//! A [`Handler`] receives one decoded request with its streaming body and
//! returns a response whose body is any [`http_body::Body`]. The connection
//! decides the wire framing from what the body yields, so handlers never
//! deal with `Content-Length` or chunking unless they want to force it.
//! Handlers must be safe to share across connections.
//!
//! Applications that want routing, extractors, and a ready-made accept loop
//! use the `origin-web` crate, whose server implements [`Handler`] itself.
//! To drive the engine directly, [`make_handler`] turns a plain async
//! function into a handler; `examples/echo_server.rs` shows the full wiring.

use std::error::Error;
use std::future::Future;

use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

pub trait Handler: Send + Sync {
    /// Response body type; its size hint feeds the auto-framing decision.
    type RespBody: Body;
    /// Handler failure; the connection answers with an empty `500`.
    type Error: Into<Box<dyn Error + Send + Sync>>;
    type Fut<'fut>: Future<Output = Result<Response<Self::RespBody>, Self::Error>>
    where
        Self: 'fut;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_>;
}

/// Wraps a plain async function as a [`Handler`].
///
/// This is the shortest path from a function to a served connection:
///
/// ```no_run
/// use std::convert::Infallible;
/// use std::sync::Arc;
///
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use http_body_util::Full;
/// use origin_http::connection::HttpConnection;
/// use origin_http::handler::make_handler;
/// use origin_http::protocol::body::ReqBody;
///
/// async fn hello(_req: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
///     Ok(Response::new(Full::new(Bytes::from_static(b"hello"))))
/// }
///
/// # async fn serve(stream: tokio::net::TcpStream) -> Result<(), origin_http::protocol::HttpError> {
/// let handler = Arc::new(make_handler(hello));
/// let (reader, writer) = stream.into_split();
/// HttpConnection::new(reader, writer).process(handler).await
/// # }
/// ```
pub fn make_handler<F, B, E, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    B: Body,
    E: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<B>, E>> + Send,
{
    HandlerFn { f }
}

/// [`Handler`] backed by a function; built with [`make_handler`].
#[derive(Debug, Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, B, E, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    B: Body,
    E: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<B>, E>> + Send,
{
    type RespBody = B;
    type Error = E;
    type Fut<'fut>
        = Fut
    where
        Self: 'fut;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_> {
        (self.f)(req)
    }
}
