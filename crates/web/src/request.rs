//! Request context: header view, path parameters, and lazily parsed query
//! and cookie maps.

use std::collections::HashMap;
use std::sync::OnceLock;

use http::{HeaderMap, Method, Uri, Version};
use matchit::Params;
use origin_http::form::{parse_cookies, parse_query};
use origin_http::protocol::RequestHeader;

/// Everything a handler can learn about a request without touching the
/// body.
///
/// Query and cookie maps are parsed on first access and cached for the rest
/// of the request.
pub struct RequestContext<'server: 'req, 'req> {
    request_header: &'req RequestHeader,
    path_params: &'req PathParams<'server, 'req>,
    queries: OnceLock<HashMap<String, String>>,
    cookies: OnceLock<HashMap<String, String>>,
}

impl<'server, 'req> RequestContext<'server, 'req> {
    pub fn new(request_header: &'req RequestHeader, path_params: &'req PathParams<'server, 'req>) -> Self {
        Self { request_header, path_params, queries: OnceLock::new(), cookies: OnceLock::new() }
    }

    pub fn request_header(&self) -> &RequestHeader {
        self.request_header
    }

    pub fn method(&self) -> &Method {
        self.request_header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request_header.uri()
    }

    pub fn version(&self) -> Version {
        self.request_header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request_header.headers()
    }

    pub fn path_params(&self) -> &PathParams {
        self.path_params
    }

    /// Looks up a query-string parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.queries
            .get_or_init(|| parse_query(self.request_header.uri().query().unwrap_or("")))
            .get(name)
            .map(String::as_str)
    }

    /// Looks up a cookie by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .get_or_init(|| parse_cookies(self.request_header.headers()))
            .get(name)
            .map(String::as_str)
    }
}

/// Named path segments captured by the router, e.g. `id` in `/users/{id}`.
#[derive(Debug, Clone)]
pub struct PathParams<'server, 'req> {
    kind: PathParamsKind<'server, 'req>,
}

#[derive(Debug, Clone)]
enum PathParamsKind<'server, 'req> {
    None,
    Params(Params<'server, 'req>),
}

impl<'server, 'req> PathParams<'server, 'req> {
    #[inline]
    pub fn empty() -> Self {
        Self { kind: PathParamsKind::None }
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            PathParamsKind::None => true,
            PathParamsKind::Params(params) => params.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.kind {
            PathParamsKind::None => 0,
            PathParamsKind::Params(params) => params.len(),
        }
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&'req str> {
        match &self.kind {
            PathParamsKind::None => None,
            PathParamsKind::Params(params) => params.get(name),
        }
    }
}

impl<'server, 'req> From<Params<'server, 'req>> for PathParams<'server, 'req> {
    fn from(params: Params<'server, 'req>) -> Self {
        if params.is_empty() {
            Self::empty()
        } else {
            Self { kind: PathParamsKind::Params(params) }
        }
    }
}
