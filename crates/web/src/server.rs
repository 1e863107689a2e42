//! The TCP server: accept loop plus engine handler dispatching through the
//! router.

use std::error::Error;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::sync::Arc;

use http::{Request, Response, StatusCode};
use origin_http::connection::HttpConnection;
use origin_http::handler::Handler;
use origin_http::protocol::body::ReqBody;
use origin_http::protocol::RequestHeader;
use thiserror::Error as ThisError;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::body::{OptionReqBody, ResponseBody};
use crate::handler::RequestHandler;
use crate::request::RequestContext;
use crate::router::Router;

pub struct ServerBuilder {
    address: Option<Vec<SocketAddr>>,
    router: Option<Router>,
    default_handler: Option<Box<dyn RequestHandler>>,
}

#[derive(ThisError, Debug)]
pub enum ServerBuildError {
    #[error("server address must be set")]
    MissingAddress,
    #[error("router must be set")]
    MissingRouter,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, router: None, default_handler: None }
    }

    /// Sets the listen address.
    pub fn bind(mut self, address: impl ToSocketAddrs) -> Self {
        match address.to_socket_addrs() {
            Ok(addrs) => self.address = Some(addrs.collect()),
            Err(e) => error!("invalid server address: {}", e),
        }
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Handler used when no route matches; without one the server answers
    /// with an empty `404`.
    pub fn default_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.default_handler = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        Ok(Server { address, router, default_handler: self.default_handler })
    }
}

/// An HTTP/1.1 origin server: binds, accepts, and runs one connection task
/// per socket.
pub struct Server {
    address: Vec<SocketAddr>,
    router: Router,
    default_handler: Option<Box<dyn RequestHandler>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Runs the accept loop. Returns only when binding fails; individual
    /// connection errors are logged and do not stop the server.
    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            warn!("tracing subscriber already installed");
        }

        info!("listening on {:?}", self.address);
        let listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, "failed to bind server address");
                return;
            }
        };

        let handler = Arc::new(self);
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(cause = %e, "failed to accept connection");
                    continue;
                }
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                match HttpConnection::new(reader, writer).process(handler).await {
                    Ok(()) => info!(remote = %remote_addr, "connection finished"),
                    Err(e) => error!(remote = %remote_addr, "connection failed: {}", e),
                }
            });
        }
    }

    fn not_found() -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }
}

impl Handler for Server {
    type RespBody = ResponseBody;
    type Error = Box<dyn Error + Send + Sync>;
    type Fut<'fut>
        = Pin<Box<dyn Future<Output = Result<Response<Self::RespBody>, Self::Error>> + Send + 'fut>>
    where
        Self: 'fut;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_> {
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let header = RequestHeader::from(parts);
            let body = OptionReqBody::from(body);

            let route = self.router.at(header.uri().path());
            let mut ctx = RequestContext::new(&header, route.params());

            let matched = route.items().iter().find(|item| item.matches(ctx.method()));

            let response = match matched {
                Some(item) => item.handler().invoke(&mut ctx, body).await,
                None => match &self.default_handler {
                    Some(handler) => handler.invoke(&mut ctx, body).await,
                    None => Self::not_found(),
                },
            };

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::router::{get, post};
    use http::Method;
    use http_body_util::BodyExt;

    async fn home() -> &'static str {
        "home"
    }

    async fn submit(body: String) -> String {
        format!("got:{body}")
    }

    fn server() -> Server {
        let router = Router::builder()
            .route("/", get(handler_fn(home)))
            .route("/submit", post(handler_fn(submit)))
            .build();
        Server::builder().bind("127.0.0.1:0").router(router).build().unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<ReqBody> {
        Request::builder().method(method).uri(uri).body(ReqBody::empty()).unwrap()
    }

    #[tokio::test]
    async fn dispatches_on_path() {
        let server = server();

        let response = server.call(request(Method::GET, "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"home");
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let server = server();
        let response = server.call(request(Method::GET, "/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn method_filter_applies() {
        let server = server();
        // wrong method on a known path falls through to 404
        let response = server.call(request(Method::GET, "/submit")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_pieces_fail_the_build() {
        let result = Server::builder().bind("127.0.0.1:0").build();
        assert!(matches!(result, Err(ServerBuildError::MissingRouter)));

        let result = Server::builder().router(Router::builder().build()).build();
        assert!(matches!(result, Err(ServerBuildError::MissingAddress)));
    }
}
