use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use origin_http::protocol::body::ReqBody;
use origin_http::protocol::{HttpError, ParseError};
use tokio::sync::Mutex;

/// A clonable, consume-once wrapper around the request body.
///
/// Extractors receive clones of this handle; whichever one actually needs
/// the bytes takes the body out, and any later attempt fails instead of
/// silently reading an empty stream.
#[derive(Clone)]
pub struct OptionReqBody {
    inner: Arc<Mutex<Option<ReqBody>>>,
}

impl From<ReqBody> for OptionReqBody {
    fn from(body: ReqBody) -> Self {
        Self { inner: Arc::new(Mutex::new(Some(body))) }
    }
}

impl OptionReqBody {
    pub async fn can_consume(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Takes the body and runs `f` on it. Fails if it was already consumed.
    pub async fn apply<T, F, Fut>(&self, f: F) -> Result<T, ParseError>
    where
        F: FnOnce(ReqBody) -> Fut,
        Fut: Future<Output = Result<T, ParseError>>,
    {
        let mut guard = self.inner.lock().await;
        let Some(body) = guard.take() else {
            return Err(ParseError::invalid_body("request body already consumed"));
        };
        f(body).await
    }
}

/// Response body handed back to the engine: a single buffer or a stream.
pub struct ResponseBody {
    kind: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, HttpError>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { kind: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self { kind: Kind::Once(Some(bytes)) }
        }
    }

    /// A streaming body; the engine decides its wire framing from what it
    /// yields.
    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes, Error = HttpError> + Send + 'static,
    {
        Self { kind: Kind::Stream(UnsyncBoxBody::new(body)) }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Once(bytes) => Poll::Ready(bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Once(bytes) => bytes.is_none(),
            Kind::Stream(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(body) => body.size_hint(),
        }
    }
}

impl From<()> for ResponseBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::once(bytes.into())
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn once_body_yields_its_bytes_and_size() {
        let body = ResponseBody::once(Bytes::from_static(b"payload"));
        assert_eq!(body.size_hint().exact(), Some(7));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn empty_body_is_end_of_stream() {
        let body = ResponseBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[tokio::test]
    async fn body_can_only_be_consumed_once() {
        let body = OptionReqBody::from(ReqBody::empty());
        assert!(body.can_consume().await);

        let taken = body.apply(|b| async move { b.collect().await.map(|c| c.to_bytes()) }).await;
        assert!(taken.unwrap().is_empty());

        assert!(!body.can_consume().await);
        let again = body.apply(|b| async move { b.collect().await.map(|c| c.to_bytes()) }).await;
        assert!(again.is_err());
    }
}
