//! Collected multipart forms: in-memory values, file parts with spill.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::HeaderMap;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tracing::{debug, warn};

use crate::form::FormError;
use crate::multipart::reader::{MultipartReader, Part};

/// Memory cap across all non-file fields of one form.
pub const NON_FILE_MAX_MEMORY: u64 = 10 * 1024 * 1024;
/// Memory cap across all file fields of one form; larger files spill to a
/// temp file.
pub const FILE_MAX_MEMORY: u64 = 30 * 1024 * 1024;

const COPY_CHUNK: usize = 8 * 1024;

/// A fully read multipart form.
///
/// Spilled temp files are deleted by [`remove_all`](Self::remove_all) or,
/// failing that, when the form is dropped.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Non-file fields by form name.
    pub value: HashMap<String, String>,
    /// File fields by form name.
    pub file: HashMap<String, FileHeader>,
}

impl MultipartForm {
    /// Deletes every temp file this form spilled to disk.
    pub fn remove_all(&mut self) {
        for file_header in self.file.values_mut() {
            file_header.remove_spilled();
        }
    }
}

impl Drop for MultipartForm {
    fn drop(&mut self) {
        self.remove_all();
    }
}

/// One uploaded file: metadata plus content, either in memory or spilled to
/// a temp file.
#[derive(Debug)]
pub struct FileHeader {
    file_name: String,
    headers: HeaderMap,
    size: u64,
    content: FileContent,
}

#[derive(Debug)]
enum FileContent {
    Memory(Bytes),
    Spilled(PathBuf),
}

impl FileHeader {
    /// The client-supplied filename.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The part's headers as received.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Content size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the content lives in a temp file rather than memory.
    pub fn is_spilled(&self) -> bool {
        matches!(self.content, FileContent::Spilled(_))
    }

    /// Path of the spilled temp file, if any.
    pub fn temp_path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Memory(_) => None,
            FileContent::Spilled(path) => Some(path),
        }
    }

    /// Opens the content for reading, wherever it lives.
    pub async fn open(&self) -> std::io::Result<FileContentReader> {
        match &self.content {
            FileContent::Memory(bytes) => Ok(FileContentReader::Memory(Cursor::new(bytes.clone()))),
            FileContent::Spilled(path) => Ok(FileContentReader::File(tokio::fs::File::open(path).await?)),
        }
    }

    /// Copies the content into `dest`, returning the number of bytes
    /// written.
    pub async fn save(&self, dest: impl AsRef<Path>) -> std::io::Result<u64> {
        let mut reader = self.open().await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }

    fn remove_spilled(&mut self) {
        if let FileContent::Spilled(path) = &self.content {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), "failed to remove multipart temp file: {}", e);
            }
            self.content = FileContent::Memory(Bytes::new());
        }
    }
}

/// Reader over a [`FileHeader`]'s content.
pub enum FileContentReader {
    Memory(Cursor<Bytes>),
    File(tokio::fs::File),
}

impl AsyncRead for FileContentReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            FileContentReader::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
            FileContentReader::File(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl<R> MultipartReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Reads the whole form with the default memory caps.
    ///
    /// Non-file fields share [`NON_FILE_MAX_MEMORY`]; exceeding it fails
    /// with [`FormError::PayloadTooLarge`]. File fields share
    /// [`FILE_MAX_MEMORY`]; a file that does not fit the remaining budget is
    /// written to a temp file (`multipart-` prefix in the OS temp dir)
    /// instead of failing.
    pub async fn read_form(&mut self) -> Result<MultipartForm, FormError> {
        self.read_form_with_limits(NON_FILE_MAX_MEMORY, FILE_MAX_MEMORY).await
    }

    /// [`read_form`](Self::read_form) with explicit caps.
    pub async fn read_form_with_limits(
        &mut self,
        mut non_file_budget: u64,
        mut file_budget: u64,
    ) -> Result<MultipartForm, FormError> {
        let mut form = MultipartForm::default();

        loop {
            let Some(mut part) = self.next_part().await? else { break };

            let name = part.form_name().to_string();
            if name.is_empty() {
                continue;
            }
            let file_name = part.file_name().to_string();

            if file_name.is_empty() {
                let data = copy_up_to(&mut part, non_file_budget + 1).await?;
                let read = data.len() as u64;
                if read > non_file_budget {
                    return Err(FormError::PayloadTooLarge);
                }
                non_file_budget -= read;
                form.value.insert(name, String::from_utf8_lossy(&data).into_owned());
                continue;
            }

            let data = copy_up_to(&mut part, file_budget + 1).await?;
            let read = data.len() as u64;
            let headers = part.headers().clone();

            let file_header = if read > file_budget {
                let (path, size) = spill_to_temp(&data, &mut part).await?;
                debug!(name = %name, size, path = %path.display(), "multipart file spilled to disk");
                FileHeader { file_name, headers, size, content: FileContent::Spilled(path) }
            } else {
                file_budget -= read;
                FileHeader { file_name, headers, size: read, content: FileContent::Memory(Bytes::from(data)) }
            };

            form.file.insert(name, file_header);
        }

        Ok(form)
    }
}

/// Reads at most `limit` bytes from the part.
async fn copy_up_to<R>(part: &mut Part<'_, R>, limit: u64) -> Result<Vec<u8>, FormError>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut scratch = [0u8; COPY_CHUNK];

    while (out.len() as u64) < limit {
        let want = scratch.len().min((limit - out.len() as u64) as usize);
        let read = part.read(&mut scratch[..want]).await?;
        if read == 0 {
            break;
        }
        out.extend_from_slice(&scratch[..read]);
    }

    Ok(out)
}

/// Writes the already-buffered bytes followed by the rest of the part into a
/// fresh temp file. The file is removed again on any error.
async fn spill_to_temp<R>(buffered: &[u8], part: &mut Part<'_, R>) -> Result<(PathBuf, u64), FormError>
where
    R: AsyncRead + Unpin,
{
    let temp = tempfile::Builder::new().prefix("multipart-").tempfile()?;
    let (std_file, path) = temp.keep().map_err(|e| FormError::from(e.error))?;
    let mut file = tokio::fs::File::from_std(std_file);

    match copy_remainder(&mut file, buffered, part).await {
        Ok(size) => Ok((path, size)),
        Err(e) => {
            drop(file);
            let _ = std::fs::remove_file(&path);
            Err(e)
        }
    }
}

async fn copy_remainder<R>(
    file: &mut tokio::fs::File,
    buffered: &[u8],
    part: &mut Part<'_, R>,
) -> Result<u64, FormError>
where
    R: AsyncRead + Unpin,
{
    file.write_all(buffered).await?;
    let mut total = buffered.len() as u64;

    let mut scratch = [0u8; COPY_CHUNK];
    loop {
        let read = part.read(&mut scratch).await?;
        if read == 0 {
            break;
        }
        file.write_all(&scratch[..read]).await?;
        total += read as u64;
    }

    file.flush().await?;
    Ok(total)
}
