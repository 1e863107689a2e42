//! The streaming multipart reader and its sliding peek window.

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::multipart::MultipartError;

/// Size of the peek window over the body. Boundary detection never needs to
/// look further ahead than this, so part bodies stream in constant memory.
pub(crate) const PEEK_SIZE: usize = 4 * 1024;

const MAX_PART_HEADERS: usize = 32;

/// Reads a `multipart/form-data` body part by part.
///
/// The reader owns the body and lends out one [`Part`] at a time; the
/// mutable borrow makes it impossible to read part N+1 before part N has
/// been released, which is exactly the order the bytes arrive in. Dropping a
/// part early is fine: the next [`next_part`](Self::next_part) call drains
/// the leftovers to the boundary first.
pub struct MultipartReader<R> {
    bufr: PeekReader<R>,
    /// `--B`
    dash_boundary: Vec<u8>,
    /// `--B--`
    dash_boundary_dash: Vec<u8>,
    /// `\r\n--B`, the needle searched for inside part bodies
    crlf_dash_boundary: Vec<u8>,
    current: Option<PartState>,
    finished: bool,
}

/// Read state of the part currently being consumed, kept on the reader so a
/// dropped `Part` can still be drained.
struct PartState {
    /// Bytes left before the located boundary; `None` while the boundary has
    /// not been found yet.
    substitute: Option<usize>,
    closed: bool,
}

impl<R> MultipartReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Builds a reader over `body` with the given boundary.
    ///
    /// Fails when the boundary is empty or too long for the peek window
    /// (the window must hold the full `\r\n--B` marker plus one byte).
    pub fn new(body: R, boundary: &str) -> Result<Self, MultipartError> {
        if boundary.is_empty() {
            return Err(MultipartError::BoundaryMissing);
        }

        let crlf_dash_boundary = format!("\r\n--{boundary}").into_bytes();
        if crlf_dash_boundary.len() + 1 > PEEK_SIZE {
            return Err(MultipartError::BoundaryTooLong { len: boundary.len(), max: PEEK_SIZE });
        }

        Ok(Self {
            bufr: PeekReader::new(body),
            dash_boundary: format!("--{boundary}").into_bytes(),
            dash_boundary_dash: format!("--{boundary}--").into_bytes(),
            crlf_dash_boundary,
            current: None,
            finished: false,
        })
    }

    /// Advances to the next part.
    ///
    /// Drains whatever is left of the current part, consumes the separating
    /// CRLF, then reads the delimiter line: `--B--` ends the form (`None`),
    /// `--B` introduces the next part, anything else is a protocol error.
    pub async fn next_part(&mut self) -> Result<Option<Part<'_, R>>, MultipartError> {
        if self.finished {
            return Ok(None);
        }

        if self.current.is_some() {
            self.drain_current().await?;
            self.bufr.discard_crlf().await?;
            self.current = None;
        }

        let line = self.bufr.read_line(PEEK_SIZE).await?;
        if line == self.dash_boundary_dash {
            self.finished = true;
            return Ok(None);
        }
        if line != self.dash_boundary {
            return Err(MultipartError::BadDelimiter { found: String::from_utf8_lossy(&line).into_owned() });
        }

        let headers = self.read_part_headers().await?;
        self.current = Some(PartState { substitute: None, closed: false });

        Ok(Some(Part { mr: self, headers, parsed: false, form_name: None, file_name: None }))
    }

    /// Reads part bytes into `buf`, returning `Ok(0)` at the part's end.
    ///
    /// Implements the sliding-window search: peek up to [`PEEK_SIZE`] bytes,
    /// look for `\r\n--B`; when found, hand out exactly the bytes before it.
    /// When not found and more body may come, hand out at most
    /// `window - len(\r\n--B) + 1` bytes so a boundary split across reads is
    /// reassembled by the next peek. A body that ends without the boundary
    /// reads as an immediately finished part; the missing delimiter then
    /// fails the following [`next_part`](Self::next_part).
    async fn read_part(&mut self, buf: &mut [u8]) -> Result<usize, MultipartError> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let Some(state) = self.current.as_mut() else { return Ok(0) };
            if state.closed {
                return Ok(0);
            }

            if let Some(remaining) = state.substitute {
                if remaining == 0 {
                    state.closed = true;
                    return Ok(0);
                }

                // everything up to the boundary is already buffered
                let window = self.bufr.buffered();
                let take = remaining.min(buf.len()).min(window.len());
                buf[..take].copy_from_slice(&window[..take]);
                self.bufr.consume(take);
                state.substitute = Some(remaining - take);
                return Ok(take);
            }

            let (found, window_len) = {
                let window = self.bufr.fill(PEEK_SIZE).await?;
                (find_subsequence(window, &self.crlf_dash_boundary), window.len())
            };

            match found {
                Some(index) => {
                    state.substitute = Some(index);
                }
                None if self.bufr.saw_eof() => {
                    // premature close: the part ends here, the missing
                    // boundary surfaces from the next next_part call
                    state.substitute = Some(0);
                }
                None => {
                    // keep the last len(\r\n--B)-1 bytes around so a partial
                    // boundary at the window edge joins the next peek
                    let max_read = PEEK_SIZE - self.crlf_dash_boundary.len() + 1;
                    let take = max_read.min(buf.len()).min(window_len);
                    let window = self.bufr.buffered();
                    buf[..take].copy_from_slice(&window[..take]);
                    self.bufr.consume(take);
                    return Ok(take);
                }
            }
        }
    }

    async fn drain_current(&mut self) -> Result<(), MultipartError> {
        let mut scratch = [0u8; 1024];
        while self.read_part(&mut scratch).await? > 0 {}
        Ok(())
    }

    /// Parses the part's header block with the same grammar as request
    /// headers. The block is bounded by the peek window.
    async fn read_part_headers(&mut self) -> Result<HeaderMap, MultipartError> {
        loop {
            let complete = {
                let window = self.bufr.fill(PEEK_SIZE).await?;
                let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
                match httparse::parse_headers(window, &mut headers) {
                    Ok(Status::Complete((used, parsed))) => {
                        let mut map = HeaderMap::with_capacity(parsed.len());
                        for header in parsed {
                            let name = HeaderName::from_bytes(header.name.as_bytes())
                                .map_err(MultipartError::invalid_part_header)?;
                            let value = HeaderValue::from_bytes(header.value)
                                .map_err(MultipartError::invalid_part_header)?;
                            map.append(name, value);
                        }
                        Some((map, used))
                    }
                    Ok(Status::Partial) => None,
                    Err(e) => return Err(MultipartError::invalid_part_header(e)),
                }
            };

            match complete {
                Some((map, used)) => {
                    self.bufr.consume(used);
                    return Ok(map);
                }
                None => {
                    if self.bufr.saw_eof() {
                        return Err(MultipartError::UnexpectedEof);
                    }
                    if self.bufr.buffered().len() >= PEEK_SIZE {
                        return Err(MultipartError::invalid_part_header("part header block too large"));
                    }
                    // fill sees more data on the next round
                }
            }
        }
    }
}

/// One part of a multipart form, borrowed from its [`MultipartReader`].
pub struct Part<'mr, R> {
    mr: &'mr mut MultipartReader<R>,
    headers: HeaderMap,
    parsed: bool,
    form_name: Option<String>,
    file_name: Option<String>,
}

impl<R> Part<'_, R>
where
    R: AsyncRead + Unpin,
{
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `name` parameter of the part's `Content-Disposition`, or `""`.
    pub fn form_name(&mut self) -> &str {
        if !self.parsed {
            self.parse_disposition();
        }
        self.form_name.as_deref().unwrap_or("")
    }

    /// The `filename` parameter of the part's `Content-Disposition`, or
    /// `""` for non-file fields.
    pub fn file_name(&mut self) -> &str {
        if !self.parsed {
            self.parse_disposition();
        }
        self.file_name.as_deref().unwrap_or("")
    }

    /// Reads part bytes, returning `Ok(0)` once the part is exhausted.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, MultipartError> {
        self.mr.read_part(buf).await
    }

    /// `Content-Disposition: form-data; name="a"; filename="1.txt"`
    fn parse_disposition(&mut self) {
        self.parsed = true;

        let Some(value) = self
            .headers
            .get(http::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
        else {
            return;
        };

        let mut pieces = value.split(';');
        match pieces.next() {
            Some(kind) if kind.trim().eq_ignore_ascii_case("form-data") => {}
            _ => return,
        }

        for piece in pieces {
            let Some((key, value)) = piece.split_once('=') else { return };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "name" => self.form_name = Some(value.to_string()),
                "filename" => self.file_name = Some(value.to_string()),
                _ => {}
            }
        }
    }
}

/// Buffered reader with an explicit fill-to-length peek, the primitive the
/// boundary search is built on.
struct PeekReader<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

impl<R> PeekReader<R>
where
    R: AsyncRead + Unpin,
{
    fn new(inner: R) -> Self {
        Self { inner, buf: BytesMut::with_capacity(PEEK_SIZE), eof: false }
    }

    /// Reads until `n` bytes are buffered or the body ends, then returns up
    /// to `n` buffered bytes without consuming them.
    async fn fill(&mut self, n: usize) -> Result<&[u8], MultipartError> {
        while self.buf.len() < n && !self.eof {
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
        Ok(&self.buf[..self.buf.len().min(n)])
    }

    fn buffered(&self) -> &[u8] {
        &self.buf
    }

    fn consume(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Whether the underlying body has reported end-of-stream.
    fn saw_eof(&self) -> bool {
        self.eof
    }

    /// Reads one line, stripping the trailing CRLF (or bare LF).
    async fn read_line(&mut self, max: usize) -> Result<BytesMut, MultipartError> {
        let mut searched = 0;
        loop {
            if let Some(position) = self.buf[searched..].iter().position(|&b| b == b'\n') {
                let mut line = self.buf.split_to(searched + position + 1);
                line.truncate(line.len() - 1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                return Ok(line);
            }

            searched = self.buf.len();
            if self.eof {
                return Err(MultipartError::UnexpectedEof);
            }
            if self.buf.len() >= max {
                return Err(MultipartError::BadDelimiter {
                    found: String::from_utf8_lossy(&self.buf[..64.min(self.buf.len())]).into_owned(),
                });
            }
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }

    /// Consumes exactly `\r\n`.
    async fn discard_crlf(&mut self) -> Result<(), MultipartError> {
        let window = self.fill(2).await?;
        if window == b"\r\n" {
            self.consume(2);
            Ok(())
        } else {
            Err(MultipartError::MissingCrlf)
        }
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Yields at most `step` bytes per read, forcing the window joins that a
    /// slow network produces.
    struct DripReader {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl DripReader {
        fn new(data: impl Into<Vec<u8>>, step: usize) -> Self {
            Self { data: data.into(), pos: 0, step }
        }
    }

    impl AsyncRead for DripReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let remaining = &self.data[self.pos..];
            let n = remaining.len().min(self.step).min(buf.remaining());
            buf.put_slice(&remaining[..n]);
            self.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    async fn read_all<R: AsyncRead + Unpin>(part: &mut Part<'_, R>) -> Vec<u8> {
        let mut out = Vec::new();
        let mut scratch = [0u8; 256];
        loop {
            let n = part.read(&mut scratch).await.unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&scratch[..n]);
        }
    }

    const TWO_FIELDS: &str = "--X\r\n\
        Content-Disposition: form-data; name=\"username\"\r\n\
        \r\n\
        gu\r\n\
        --X\r\n\
        Content-Disposition: form-data; name=\"file1\"; filename=\"1.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        this is 1.txt!\r\n\
        --X--\r\n";

    #[tokio::test]
    async fn yields_each_part_in_order() {
        let mut reader = MultipartReader::new(Cursor::new(TWO_FIELDS.as_bytes().to_vec()), "X").unwrap();

        let mut part = reader.next_part().await.unwrap().unwrap();
        assert_eq!(part.form_name(), "username");
        assert_eq!(part.file_name(), "");
        assert_eq!(read_all(&mut part).await, b"gu");
        drop(part);

        let mut part = reader.next_part().await.unwrap().unwrap();
        assert_eq!(part.form_name(), "file1");
        assert_eq!(part.file_name(), "1.txt");
        assert_eq!(part.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(read_all(&mut part).await, b"this is 1.txt!");
        drop(part);

        assert!(reader.next_part().await.unwrap().is_none());
        // the reader stays finished
        assert!(reader.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unread_part_is_drained_by_next_part() {
        let mut reader = MultipartReader::new(Cursor::new(TWO_FIELDS.as_bytes().to_vec()), "X").unwrap();

        let part = reader.next_part().await.unwrap().unwrap();
        drop(part); // never read

        let mut part = reader.next_part().await.unwrap().unwrap();
        assert_eq!(part.form_name(), "file1");
        assert_eq!(read_all(&mut part).await, b"this is 1.txt!");
    }

    #[tokio::test]
    async fn boundary_split_across_window_joins() {
        // a part body larger than the peek window, delivered in 7-byte
        // drips so the boundary marker regularly straddles fills
        let content = vec![b'a'; PEEK_SIZE + 1234];
        let mut body = Vec::new();
        body.extend_from_slice(b"--X\r\nContent-Disposition: form-data; name=\"big\"\r\n\r\n");
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n--X--\r\n");

        let mut reader = MultipartReader::new(DripReader::new(body, 7), "X").unwrap();
        let mut part = reader.next_part().await.unwrap().unwrap();
        let data = read_all(&mut part).await;
        assert_eq!(data.len(), content.len());
        assert_eq!(data, content);
        drop(part);
        assert!(reader.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn boundary_lookalike_inside_content_is_preserved() {
        let content = b"data with \r\n--Y lookalike and --X inline".to_vec();
        let mut body = Vec::new();
        body.extend_from_slice(b"--X\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\n");
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n--X--\r\n");

        let mut reader = MultipartReader::new(DripReader::new(body, 3), "X").unwrap();
        let mut part = reader.next_part().await.unwrap().unwrap();
        assert_eq!(read_all(&mut part).await, content);
    }

    #[tokio::test]
    async fn premature_eof_fails_the_next_part() {
        let body = b"--X\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\ntruncated".to_vec();
        let mut reader = MultipartReader::new(Cursor::new(body), "X").unwrap();

        let mut part = reader.next_part().await.unwrap().unwrap();
        // the part reads what is there, then reports end-of-part
        let data = read_all(&mut part).await;
        assert!(data.len() <= b"truncated".len());
        drop(part);

        assert!(reader.next_part().await.is_err());
    }

    #[tokio::test]
    async fn wrong_delimiter_is_rejected() {
        let body = b"--WRONG\r\n\r\n".to_vec();
        let mut reader = MultipartReader::new(Cursor::new(body), "X").unwrap();
        assert!(matches!(reader.next_part().await, Err(MultipartError::BadDelimiter { .. })));
    }

    #[tokio::test]
    async fn oversized_boundary_is_rejected_at_construction() {
        let boundary = "b".repeat(PEEK_SIZE);
        assert!(matches!(
            MultipartReader::new(Cursor::new(Vec::new()), &boundary),
            Err(MultipartError::BoundaryTooLong { .. })
        ));
    }

    #[tokio::test]
    async fn empty_part_value() {
        let body = b"--X\r\nContent-Disposition: form-data; name=\"empty\"\r\n\r\n\r\n--X--\r\n".to_vec();
        let mut reader = MultipartReader::new(Cursor::new(body), "X").unwrap();

        let mut part = reader.next_part().await.unwrap().unwrap();
        assert_eq!(part.form_name(), "empty");
        assert_eq!(read_all(&mut part).await, b"");
        drop(part);
        assert!(reader.next_part().await.unwrap().is_none());
    }
}
