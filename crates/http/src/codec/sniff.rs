//! Content-Type detection for responses that did not set one.
//!
//! Looks at up to the first 512 bytes of the staged response body. The table
//! covers the common web signatures; anything unrecognized falls back to
//! `text/plain` when it scans as text and `application/octet-stream`
//! otherwise.

/// Number of leading body bytes considered.
pub(crate) const SNIFF_LEN: usize = 512;

/// Detects a Content-Type from the leading bytes of a body.
///
/// Always returns a valid MIME type; the fallback is
/// `application/octet-stream`.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let trimmed = trim_leading_whitespace(data);

    for (signature, content_type) in HTML_SIGNATURES {
        if matches_tag_prefix(trimmed, signature) {
            return content_type;
        }
    }

    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    for (magic, content_type) in MAGIC_SIGNATURES {
        if data.starts_with(magic) {
            return content_type;
        }
    }

    if looks_like_text(data) {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

const HTML_SIGNATURES: &[(&[u8], &str)] = &[
    (b"<!DOCTYPE HTML", "text/html; charset=utf-8"),
    (b"<HTML", "text/html; charset=utf-8"),
    (b"<HEAD", "text/html; charset=utf-8"),
    (b"<BODY", "text/html; charset=utf-8"),
];

const MAGIC_SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
    (b"{", "application/json"),
    (b"[", "application/json"),
];

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b" \t\r\n".contains(b)).unwrap_or(data.len());
    &data[start..]
}

/// Case-insensitive tag match where the byte after the tag must end the
/// token (`>`, whitespace, or end of the sniffed window).
fn matches_tag_prefix(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() {
        return false;
    }
    if !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    match data.get(tag.len()) {
        None => true,
        Some(&b) => b == b'>' || b == b' ' || b == b'\t' || b == b'\r' || b == b'\n',
    }
}

fn looks_like_text(data: &[u8]) -> bool {
    !data.iter().any(|&b| b < 0x09 || (0x0e..0x20).contains(&b) || b == 0x7f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_and_doctype() {
        assert_eq!(detect_content_type(b"<html><body>hi</body></html>"), "text/html; charset=utf-8");
        assert_eq!(detect_content_type(b"  <!doctype html><html>"), "text/html; charset=utf-8");
    }

    #[test]
    fn binary_magics() {
        assert_eq!(detect_content_type(b"%PDF-1.7 ..."), "application/pdf");
        assert_eq!(detect_content_type(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(detect_content_type(b"\xff\xd8\xff\xe0jfif"), "image/jpeg");
    }

    #[test]
    fn plain_text_fallback() {
        assert_eq!(detect_content_type(b"hello world"), "text/plain; charset=utf-8");
    }

    #[test]
    fn binary_fallback() {
        assert_eq!(detect_content_type(b"\x00\x01\x02\x03"), "application/octet-stream");
    }

    #[test]
    fn only_the_first_window_counts() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00); // binary byte outside the window
        assert_eq!(detect_content_type(&data), "text/plain; charset=utf-8");
    }
}
