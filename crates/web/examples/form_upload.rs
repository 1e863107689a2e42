//! Form handling: URL-encoded fields and multipart file uploads.
//!
//! ```text
//! cargo run --example form_upload
//! curl -d 'username=gu&password=123' http://127.0.0.1:3000/login
//! curl -F 'username=gu' -F 'file1=@1.txt' http://127.0.0.1:3000/upload
//! ```

use origin_http::form::Form as ParsedForm;
use origin_web::extract::Form;
use origin_web::router::{post, Router};
use origin_web::{handler_fn, Server};

async fn login(Form(form): Form) -> String {
    match (form.value("username"), form.value("password")) {
        (Some(username), Some(_)) => format!("welcome, {username}\n"),
        _ => "missing credentials\n".to_string(),
    }
}

async fn upload(Form(form): Form) -> String {
    let mut lines = Vec::new();
    if let Some(username) = form.value("username") {
        lines.push(format!("username: {username}"));
    }
    if let ParsedForm::Multipart(multipart) = &form {
        for (name, file) in &multipart.file {
            lines.push(format!("{name}: {} ({} bytes)", file.file_name(), file.size()));
        }
    }
    lines.push(String::new());
    lines.join("\n")
}

#[tokio::main]
async fn main() {
    let router = Router::builder()
        .route("/login", post(handler_fn(login)))
        .route("/upload", post(handler_fn(upload)))
        .build();

    Server::builder()
        .router(router)
        .bind("127.0.0.1:3000")
        .build()
        .unwrap()
        .start()
        .await;
}
