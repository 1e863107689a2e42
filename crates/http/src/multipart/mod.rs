//! Streaming `multipart/form-data` reading.
//!
//! [`MultipartReader`] walks a body part by part without buffering more than
//! a fixed 4 KiB peek window; each [`Part`] streams its bytes up to the next
//! boundary, which is located inside the window even when it straddles two
//! socket reads. [`MultipartForm`] collects the parts into memory with hard
//! caps, spilling oversized file parts to temp files.
//!
//! On the wire a form with boundary `B` looks like:
//!
//! ```text
//! --B\r\n
//! Content-Disposition: form-data; name="username"\r\n
//! \r\n
//! gu\r\n
//! --B\r\n
//! Content-Disposition: form-data; name="file1"; filename="1.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! this is 1.txt!\r\n
//! --B--\r\n
//! ```

mod form;
mod reader;

pub use form::{FileContentReader, FileHeader, MultipartForm};
pub use reader::{MultipartReader, Part};

use std::io;
use thiserror::Error;

/// Errors raised while reading a multipart body.
#[derive(Error, Debug)]
pub enum MultipartError {
    /// The `Content-Type` carried no usable boundary parameter.
    #[error("no multipart boundary detected")]
    BoundaryMissing,

    /// The boundary cannot fit the peek window together with one extra byte.
    #[error("multipart boundary too long: {len} exceeds the limit {max}")]
    BoundaryTooLong { len: usize, max: usize },

    /// A line that had to be a delimiter was something else.
    #[error("expected multipart delimiter, got {found:?}")]
    BadDelimiter { found: String },

    /// CRLF expected between parts was missing.
    #[error("expected CRLF after multipart part")]
    MissingCrlf,

    /// The body ended in the middle of the form.
    #[error("unexpected eof in multipart body")]
    UnexpectedEof,

    #[error("invalid part header: {reason}")]
    InvalidPartHeader { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl MultipartError {
    pub(crate) fn invalid_part_header<S: ToString>(reason: S) -> Self {
        Self::InvalidPartHeader { reason: reason.to_string() }
    }
}

/// Extracts the boundary parameter from a `multipart/form-data` content
/// type. Surrounding quotes are stripped; an empty boundary reads as absent.
pub fn parse_boundary(content_type: &str) -> Option<String> {
    let (mime, params) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    for param in params.split(';') {
        let Some((key, value)) = param.split_once('=') else { continue };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() {
                return None;
            }
            return Some(boundary.to_string());
        }
    }

    None
}
