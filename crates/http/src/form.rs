//! Form parsing: URL-encoded bodies, multipart dispatch, query strings and
//! cookies.
//!
//! The query grammar is shared between URL query strings and
//! `application/x-www-form-urlencoded` bodies: pieces split on `&`, each
//! piece split on its first `=`, both sides trimmed, malformed pieces
//! dropped. No percent-decoding is applied.

use std::collections::HashMap;
use std::io;

use futures::TryStreamExt;
use http::header::{CONTENT_TYPE, COOKIE};
use http::HeaderMap;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::multipart::{parse_boundary, MultipartError, MultipartForm, MultipartReader};
use crate::protocol::body::ReqBody;
use crate::protocol::{ParseError, RequestHeader};

/// Errors raised while parsing a form body.
#[derive(Error, Debug)]
pub enum FormError {
    /// The request method cannot carry a form body.
    #[error("missing form body")]
    NoBody,

    /// The content type is neither URL-encoded nor multipart form data.
    #[error("unsupported form content type: {0}")]
    UnsupportedContentType(String),

    /// The non-file fields exceeded their shared memory cap.
    #[error("multipart message too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// Reading the request body failed.
    #[error("body error: {0}")]
    Body(ParseError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A parsed form body.
#[derive(Debug)]
pub enum Form {
    UrlEncoded(HashMap<String, String>),
    Multipart(MultipartForm),
}

impl Form {
    /// Looks up a non-file field by name.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self {
            Form::UrlEncoded(values) => values.get(name).map(String::as_str),
            Form::Multipart(form) => form.value.get(name).map(String::as_str),
        }
    }

    /// Looks up a file field by name; always `None` for URL-encoded forms.
    pub fn file(&self, name: &str) -> Option<&crate::multipart::FileHeader> {
        match self {
            Form::UrlEncoded(_) => None,
            Form::Multipart(form) => form.file.get(name),
        }
    }
}

/// Parses the request's form body.
///
/// Requires `POST` or `PUT`. Dispatches on the `Content-Type` prefix:
/// `application/x-www-form-urlencoded` bodies are read whole and parsed with
/// the query grammar, `multipart/form-data` bodies stream through
/// [`MultipartReader::read_form`] with its memory caps.
pub async fn parse_form(header: &RequestHeader, body: ReqBody) -> Result<Form, FormError> {
    if !header.allows_body() {
        return Err(FormError::NoBody);
    }

    let content_type = header
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let mime = content_type.split(';').next().unwrap_or("").trim();

    match mime {
        "application/x-www-form-urlencoded" => {
            let bytes = body.collect().await.map_err(FormError::Body)?.to_bytes();
            let text = String::from_utf8_lossy(&bytes);
            Ok(Form::UrlEncoded(parse_query(&text)))
        }
        "multipart/form-data" => {
            let boundary = parse_boundary(content_type).ok_or(MultipartError::BoundaryMissing)?;
            let mut reader = MultipartReader::new(body_reader(body), &boundary)?;
            Ok(Form::Multipart(reader.read_form().await?))
        }
        other => Err(FormError::UnsupportedContentType(other.to_string())),
    }
}

/// Adapts a [`ReqBody`] into a byte reader, e.g. for building a
/// [`MultipartReader`] directly.
pub fn body_reader(body: ReqBody) -> impl AsyncRead + Send + Unpin {
    StreamReader::new(body.into_data_stream().map_err(io::Error::other))
}

/// Parses a query string (or URL-encoded form body) into a map.
///
/// Pieces without `=`, or with `=` as their final character, are dropped.
pub fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut queries = HashMap::new();

    for piece in raw.split('&') {
        let Some(eq) = piece.find('=') else { continue };
        if eq + 1 == piece.len() {
            continue;
        }
        queries.insert(piece[..eq].trim().to_string(), piece[eq + 1..].trim().to_string());
    }

    queries
}

/// Parses every `Cookie` header into a map.
///
/// Each header value is a `;`-separated list of `name=value` pairs; pairs
/// without `=` are dropped, names and values are trimmed.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            let Some((name, val)) = pair.split_once('=') else { continue };
            cookies.insert(name.trim().to_string(), val.trim().to_string());
        }
    }

    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request};

    #[test]
    fn query_grammar() {
        let queries = parse_query("name=jack&age=12");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries["name"], "jack");
        assert_eq!(queries["age"], "12");

        // malformed pieces are dropped
        let queries = parse_query("a&b=&c=3& d = 4 ");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries["c"], "3");
        assert_eq!(queries["d"], "4");

        assert!(parse_query("").is_empty());
    }

    #[test]
    fn cookie_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, "uuid=12314753; tid=1BDB9E9; HOME=1".parse().unwrap());

        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies["uuid"], "12314753");
        assert_eq!(cookies["tid"], "1BDB9E9");
        assert_eq!(cookies["HOME"], "1");
    }

    #[test]
    fn cookies_accumulate_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, "a=1".parse().unwrap());
        headers.append(COOKIE, "b=2; c".parse().unwrap());

        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["a"], "1");
        assert_eq!(cookies["b"], "2");
    }

    #[tokio::test]
    async fn form_requires_a_body_method() {
        let header = RequestHeader::from(Request::builder().method(Method::GET).body(()).unwrap());
        let result = parse_form(&header, ReqBody::empty()).await;
        assert!(matches!(result, Err(FormError::NoBody)));
    }

    #[tokio::test]
    async fn unknown_content_type_is_rejected() {
        let header = RequestHeader::from(
            Request::builder()
                .method(Method::POST)
                .header(CONTENT_TYPE, "text/csv")
                .body(())
                .unwrap(),
        );
        let result = parse_form(&header, ReqBody::empty()).await;
        assert!(matches!(result, Err(FormError::UnsupportedContentType(_))));
    }

    #[tokio::test]
    async fn missing_boundary_is_rejected() {
        let header = RequestHeader::from(
            Request::builder()
                .method(Method::POST)
                .header(CONTENT_TYPE, "multipart/form-data")
                .body(())
                .unwrap(),
        );
        let result = parse_form(&header, ReqBody::empty()).await;
        assert!(matches!(result, Err(FormError::Multipart(MultipartError::BoundaryMissing))));
    }
}
