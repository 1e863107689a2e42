//! Request header abstraction.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and adds the connection-level
//! decisions the engine derives from a request's first lines: whether the
//! method may carry a body, whether the client asked for `100 Continue`, and
//! whether the connection should stay open after the response.

use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// The request line and header block of one HTTP request.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, turning the header into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether this request is allowed to carry a body.
    ///
    /// Only `POST` and `PUT` requests get a body reader; every other method
    /// reads as an immediate end-of-stream regardless of its headers.
    pub fn allows_body(&self) -> bool {
        matches!(self.method(), &Method::POST | &Method::PUT)
    }

    /// Whether the client sent `Expect: 100-continue` and is waiting for an
    /// interim response before transmitting the body.
    pub fn expects_continue(&self) -> bool {
        self.headers()
            .get(EXPECT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }

    /// Whether the connection should be reused after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive unless a `Connection` header lists
    /// `close`; HTTP/1.0 defaults to close unless it lists `keep-alive`.
    /// Anything older always closes.
    pub fn should_keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;

        for value in self.headers().get_all(CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',') {
                let token = token.trim();
                if token.eq_ignore_ascii_case("close") {
                    close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        if close {
            return false;
        }

        match self.version() {
            Version::HTTP_11 => true,
            Version::HTTP_10 => keep_alive,
            _ => false,
        }
    }
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(builder: http::request::Builder) -> RequestHeader {
        RequestHeader::from(builder.body(()).unwrap())
    }

    #[test]
    fn body_allowed_only_for_post_and_put() {
        for method in [Method::POST, Method::PUT] {
            assert!(header(Request::builder().method(method)).allows_body());
        }
        for method in [Method::GET, Method::HEAD, Method::DELETE, Method::OPTIONS] {
            assert!(!header(Request::builder().method(method)).allows_body());
        }
    }

    #[test]
    fn expect_continue_is_case_insensitive() {
        let req = header(Request::builder().method(Method::POST).header("Expect", "100-Continue"));
        assert!(req.expects_continue());

        let req = header(Request::builder().method(Method::POST).header("Expect", "202-upgrade"));
        assert!(!req.expects_continue());

        let req = header(Request::builder().method(Method::POST));
        assert!(!req.expects_continue());
    }

    #[test]
    fn keep_alive_defaults_follow_version() {
        let req = header(Request::builder().version(Version::HTTP_11));
        assert!(req.should_keep_alive());

        let req = header(Request::builder().version(Version::HTTP_11).header("Connection", "close"));
        assert!(!req.should_keep_alive());

        let req = header(Request::builder().version(Version::HTTP_10));
        assert!(!req.should_keep_alive());

        let req = header(Request::builder().version(Version::HTTP_10).header("Connection", "keep-alive"));
        assert!(req.should_keep_alive());

        // close always wins, even combined with keep-alive tokens
        let req = header(Request::builder().version(Version::HTTP_11).header("Connection", "keep-alive, close"));
        assert!(!req.should_keep_alive());
    }
}
