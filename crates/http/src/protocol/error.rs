//! Error types for request parsing and response sending.
//!
//! [`HttpError`] is the connection-level error: it wraps a [`ParseError`]
//! from the decode side or a [`SendError`] from the encode side, and records
//! a recovered handler panic. Body-read errors reach the handler as
//! `ParseError` through the body handle; everything else terminates the
//! connection.

use std::io;
use thiserror::Error;

/// Top-level error for one HTTP connection.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request decoding or body reading failed.
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    /// Response encoding or the underlying write failed.
    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    /// The request handler panicked; the panic was caught and the connection
    /// is being torn down.
    #[error("handler panicked")]
    HandlerPanic,
}

/// Errors raised while decoding a request or its body.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The request line plus header block exceeded the size cap.
    #[error("header section too large: {current_size} exceeds the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("more than {max_num} headers")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid request target")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// Malformed chunked transfer-coding: a non-hex byte in the size line, a
    /// missing CRLF, or an overflowing chunk size.
    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(reason: S) -> Self {
        Self::InvalidChunk { reason: reason.to_string() }
    }

    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised while encoding or writing a response.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
