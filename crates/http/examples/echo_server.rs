//! The engine without the web layer: a bare accept loop feeding
//! [`HttpConnection`] with a handler built by [`make_handler`].
//!
//! ```text
//! cargo run --example echo_server
//! curl -d 'hello engine' http://127.0.0.1:3000/
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use origin_http::connection::HttpConnection;
use origin_http::handler::make_handler;
use origin_http::protocol::body::ReqBody;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

async fn echo(req: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => Bytes::from(format!("failed to read request body: {e}")),
    };
    Ok(Response::new(Full::new(bytes)))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let listener = TcpListener::bind("127.0.0.1:3000").await.expect("bind 127.0.0.1:3000");
    info!("echo server listening on 127.0.0.1:3000");

    let handler = Arc::new(make_handler(echo));
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("failed to accept: {}", e);
                continue;
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
                error!(remote = %remote_addr, "connection failed: {}", e);
            }
        });
    }
}
