//! Request handlers and the async-function adapter.

use std::marker::PhantomData;

use async_trait::async_trait;
use http::{Response, StatusCode};
use tracing::debug;

use crate::body::{OptionReqBody, ResponseBody};
use crate::extract::FromRequest;
use crate::fn_trait::FnTrait;
use crate::request::RequestContext;
use crate::responder::Responder;

/// A routed request handler.
///
/// Must be safe to share: one instance serves every connection.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext<'_, '_>, body: OptionReqBody) -> Response<ResponseBody>;
}

/// Adapter that turns a plain async function into a [`RequestHandler`]:
/// its parameters are built by [`FromRequest`] extractors and its return
/// value is converted through [`Responder`].
pub struct FnHandler<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

/// Wraps an async function for use as a route handler.
pub fn handler_fn<F, Args>(f: F) -> FnHandler<F, Args>
where
    F: FnTrait<Args>,
{
    FnHandler { f, _args: PhantomData }
}

#[async_trait]
impl<F, Args> RequestHandler for FnHandler<F, Args>
where
    F: FnTrait<Args>,
    F::Output: Responder + Send,
    Args: FromRequest + Send,
{
    async fn invoke(&self, ctx: &mut RequestContext<'_, '_>, body: OptionReqBody) -> Response<ResponseBody> {
        match Args::from_request(ctx, body).await {
            Ok(args) => self.f.call(args).await.response_to(ctx),
            Err(e) => {
                debug!("request extraction failed: {}", e);
                let mut response = Response::new(ResponseBody::from(e.to_string()));
                *response.status_mut() = StatusCode::BAD_REQUEST;
                response
            }
        }
    }
}
