//! Path routing.
//!
//! A [`Router`] maps request paths to handlers (with an optional method
//! filter per route); the server falls back to its default handler, or a
//! bare `404`, when nothing matches. Paths use `matchit` syntax, so
//! `/users/{id}` captures a path parameter.

use std::collections::HashMap;

use http::Method;
use tracing::debug;

use crate::handler::RequestHandler;
use crate::request::PathParams;

type InnerRouter = matchit::Router<Vec<RouterItem>>;

pub struct Router {
    inner: InnerRouter,
}

/// One registered route: a method filter plus its handler.
pub struct RouterItem {
    method: MethodFilter,
    handler: Box<dyn RequestHandler>,
}

enum MethodFilter {
    Any,
    Only(Method),
}

impl RouterItem {
    pub(crate) fn matches(&self, method: &Method) -> bool {
        match &self.method {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }

    pub(crate) fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        /// Routes requests with the matching method to `handler`.
        pub fn $name<H: RequestHandler + 'static>(handler: H) -> RouterItem {
            RouterItem { method: MethodFilter::Only(Method::$method), handler: Box::new(handler) }
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);

/// Routes every method to `handler`.
pub fn any<H: RequestHandler + 'static>(handler: H) -> RouterItem {
    RouterItem { method: MethodFilter::Any, handler: Box::new(handler) }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder { routes: HashMap::new() }
    }

    /// Matches a request path, returning the route's handlers and captured
    /// path parameters. An unknown path matches nothing.
    pub fn at<'router, 'path>(&'router self, path: &'path str) -> RouteResult<'router, 'path> {
        match self.inner.at(path) {
            Ok(matched) => RouteResult { items: matched.value.as_slice(), params: matched.params.into() },
            Err(e) => {
                debug!("no route for '{}': {}", path, e);
                RouteResult::empty()
            }
        }
    }
}

pub struct RouteResult<'router, 'path> {
    items: &'router [RouterItem],
    params: PathParams<'router, 'path>,
}

impl<'router, 'path> RouteResult<'router, 'path> {
    fn empty() -> Self {
        Self { items: &[], params: PathParams::empty() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &'router [RouterItem] {
        self.items
    }

    pub fn params(&self) -> &PathParams<'router, 'path> {
        &self.params
    }
}

pub struct RouterBuilder {
    routes: HashMap<String, Vec<RouterItem>>,
}

impl RouterBuilder {
    /// Registers a route; the same path may carry several method-filtered
    /// handlers.
    pub fn route(mut self, path: impl Into<String>, item: RouterItem) -> Self {
        self.routes.entry(path.into()).or_default().push(item);
        self
    }

    pub fn build(self) -> Router {
        let mut inner = InnerRouter::new();
        for (path, items) in self.routes {
            inner.insert(path, items).expect("route path is valid");
        }
        Router { inner }
    }
}
