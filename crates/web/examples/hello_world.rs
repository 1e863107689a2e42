//! Minimal server: one route plus a default handler.
//!
//! ```text
//! cargo run --example hello_world
//! curl -i 'http://127.0.0.1:3000/?name=gu'
//! ```

use origin_web::router::{get, Router};
use origin_web::{handler_fn, Server};

async fn hello_world() -> &'static str {
    "hello world"
}

async fn not_found() -> &'static str {
    "404 not found"
}

#[tokio::main]
async fn main() {
    let router = Router::builder().route("/", get(handler_fn(hello_world))).build();

    Server::builder()
        .router(router)
        .bind("127.0.0.1:3000")
        .default_handler(handler_fn(not_found))
        .build()
        .unwrap()
        .start()
        .await;
}
