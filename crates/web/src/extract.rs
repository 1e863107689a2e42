//! Typed request extraction.
//!
//! A handler parameter type that implements [`FromRequest`] is produced
//! from the request before the handler runs: raw bytes, UTF-8 text, a
//! deserialized query string, or a parsed form. Extractors take owned
//! values; the request body can back at most one of them.

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use http_body_util::BodyExt;
use origin_http::protocol::ParseError;
use serde::Deserialize;

use crate::body::OptionReqBody;
use crate::request::RequestContext;

/// Builds `Self` from the request context and body.
#[async_trait]
pub trait FromRequest: Sized {
    async fn from_request(ctx: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, ParseError>;
}

/// Deserializes the query string, e.g. `Query<Params>` for
/// `?name=gu&age=3`.
pub struct Query<T>(pub T);

/// The parsed form body (URL-encoded or multipart).
pub struct Form(pub origin_http::form::Form);

#[async_trait]
impl FromRequest for Bytes {
    async fn from_request(_ctx: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, ParseError> {
        body.apply(|body| async { body.collect().await.map(|collected| collected.to_bytes()) }).await
    }
}

#[async_trait]
impl FromRequest for String {
    async fn from_request(ctx: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, ParseError> {
        let bytes = Bytes::from_request(ctx, body).await?;
        String::from_utf8(bytes.into()).map_err(|_| ParseError::invalid_body("request body is not utf-8"))
    }
}

#[async_trait]
impl FromRequest for Method {
    async fn from_request(ctx: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, ParseError> {
        Ok(ctx.method().clone())
    }
}

#[async_trait]
impl<T> FromRequest for Query<T>
where
    T: for<'de> Deserialize<'de> + Send,
{
    async fn from_request(ctx: &RequestContext<'_, '_>, _body: OptionReqBody) -> Result<Self, ParseError> {
        let query = ctx.uri().query().unwrap_or("");
        serde_qs::from_str(query).map(Query).map_err(|e| ParseError::invalid_header(e.to_string()))
    }
}

#[async_trait]
impl FromRequest for Form {
    async fn from_request(ctx: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, ParseError> {
        let header = ctx.request_header();
        body.apply(|body| async move {
            origin_http::form::parse_form(header, body)
                .await
                .map(Form)
                .map_err(|e| ParseError::invalid_body(e.to_string()))
        })
        .await
    }
}

macro_rules! impl_from_request_for_tuple {
    ($($param:ident),*) => {
        #[async_trait]
        impl<$($param,)*> FromRequest for ($($param,)*)
        where
            $($param: FromRequest + Send,)*
        {
            #[allow(unused_variables)]
            async fn from_request(ctx: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, ParseError> {
                Ok(($($param::from_request(ctx, body.clone()).await?,)*))
            }
        }
    };
}

// one instantiation per arity FnTrait supports
impl_from_request_for_tuple!();
impl_from_request_for_tuple!(A);
impl_from_request_for_tuple!(A, B);
impl_from_request_for_tuple!(A, B, C);
impl_from_request_for_tuple!(A, B, C, D);
impl_from_request_for_tuple!(A, B, C, D, E);
impl_from_request_for_tuple!(A, B, C, D, E, F);
impl_from_request_for_tuple!(A, B, C, D, E, F, G);
impl_from_request_for_tuple!(A, B, C, D, E, F, G, H);
