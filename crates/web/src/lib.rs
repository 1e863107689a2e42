//! A small web layer over the `origin-http` engine.
//!
//! Provides the pieces a host application needs around the wire engine: a
//! TCP [`Server`] that spawns one connection task per accepted socket, a
//! path [`router`](crate::router) returning `404` on no match, a
//! [`RequestContext`] with lazily parsed query and cookie maps, and typed
//! [`extract`](crate::extract)ors feeding plain async functions via
//! [`handler_fn`].

mod body;
pub mod extract;
mod fn_trait;
mod handler;
mod request;
mod responder;
pub mod router;
mod server;

pub use body::{OptionReqBody, ResponseBody};
pub use fn_trait::FnTrait;
pub use handler::{handler_fn, FnHandler, RequestHandler};
pub use request::{PathParams, RequestContext};
pub use responder::Responder;
pub use server::{Server, ServerBuildError};
