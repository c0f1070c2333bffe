//! Byte stream sources for manifests and packages
//!
//! A [`StreamSource`] abstracts "give me a readable byte stream": the
//! session asks a source for the manifest document and, later, for the
//! package archive, without caring whether the bytes come from a network
//! request, a local file, or an in-memory buffer. Every [`StreamSource::open`]
//! call produces a *fresh* stream - sources are reusable, not consumed.
//!
//! # Variants
//!
//! - [`FileSource`] - local files and `file://` URLs
//! - [`MemorySource`] - in-memory bytes, used by tests and embedded manifests
//! - [`HttpSource`] - HTTP/HTTPS with custom headers and per-source TLS
//!   policy (see [`http`])
//!
//! [`source_for`] picks the right variant for a location string.
//!
//! Streams are chunked rather than fully buffered so the download phase can
//! update progress counters and observe cancellation between chunks.

pub mod http;

use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use tokio::io::AsyncReadExt;

use crate::core::UpdateError;

pub use http::{HttpOptions, HttpSource};

/// Read chunk size for file-backed streams
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Provider of readable byte streams
///
/// Implementations must be reusable: each `open` returns an independent
/// stream positioned at the start of the content.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open a fresh stream over the source's content.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::NotFound`] when the target does not exist
    /// - [`UpdateError::Network`] for connection, TLS, or HTTP failures
    /// - [`UpdateError::Io`] for local file errors
    async fn open(&self) -> Result<SourceStream, UpdateError>;

    /// Human-readable description of the source, used in logs and errors
    fn description(&self) -> String;
}

enum StreamInner {
    File(tokio::fs::File),
    Http(Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>),
    Memory(Option<Bytes>),
}

/// One open byte stream, yielded chunk by chunk
pub struct SourceStream {
    inner: StreamInner,
    length: Option<u64>,
    description: String,
}

impl std::fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStream")
            .field("length", &self.length)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl SourceStream {
    /// Stream over an open file; `length` from its metadata.
    #[must_use]
    pub fn from_file(file: tokio::fs::File, length: Option<u64>, description: String) -> Self {
        Self {
            inner: StreamInner::File(file),
            length,
            description,
        }
    }

    /// Stream over a fixed byte buffer, delivered as a single chunk.
    #[must_use]
    pub fn from_bytes(bytes: Bytes, description: String) -> Self {
        let length = Some(bytes.len() as u64);
        Self {
            inner: StreamInner::Memory(Some(bytes)),
            length,
            description,
        }
    }

    /// Stream over an HTTP response body.
    #[must_use]
    pub fn from_response(response: reqwest::Response, description: String) -> Self {
        let length = response.content_length();
        Self {
            inner: StreamInner::Http(Box::pin(response.bytes_stream())),
            length,
            description,
        }
    }

    /// Total content length in bytes, when the source declares one
    #[must_use]
    pub const fn content_length(&self) -> Option<u64> {
        self.length
    }

    /// Read the next chunk, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Io`] for file reads and
    /// [`UpdateError::Network`] for interrupted HTTP transfers.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, UpdateError> {
        match &mut self.inner {
            StreamInner::File(file) => {
                let mut buf = vec![0u8; FILE_CHUNK_SIZE];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    Ok(None)
                } else {
                    buf.truncate(n);
                    Ok(Some(Bytes::from(buf)))
                }
            }
            StreamInner::Http(stream) => match stream.next().await {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(e)) => Err(UpdateError::Network {
                    operation: format!("read from {}", self.description),
                    reason: e.to_string(),
                }),
                None => Ok(None),
            },
            StreamInner::Memory(bytes) => Ok(bytes.take()),
        }
    }
}

/// Local file source
///
/// Handles plain paths and `file://` URLs. Opening a missing file reports
/// [`UpdateError::NotFound`] rather than a bare I/O error so the failure
/// reads the same as a 404 from an HTTP source.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Source for the given local path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// The path this source reads from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StreamSource for FileSource {
    async fn open(&self) -> Result<SourceStream, UpdateError> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UpdateError::NotFound {
                    what: self.path.display().to_string(),
                }
            } else {
                UpdateError::Io(e)
            }
        })?;
        let length = file.metadata().await.ok().map(|m| m.len());
        Ok(SourceStream::from_file(file, length, self.description()))
    }

    fn description(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory source, mainly for tests and embedded defaults
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Bytes,
    name: String,
}

impl MemorySource {
    /// Source over the given bytes, with a display name for logging.
    pub fn new(bytes: impl Into<Bytes>, name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl StreamSource for MemorySource {
    async fn open(&self) -> Result<SourceStream, UpdateError> {
        Ok(SourceStream::from_bytes(self.bytes.clone(), self.description()))
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

/// Pick a source implementation for a location string.
///
/// `http`/`https` URLs get an [`HttpSource`] built with the given options;
/// `file://` URLs and everything else resolve to a [`FileSource`].
///
/// # Errors
///
/// Returns [`UpdateError::Network`] when the HTTP client cannot be
/// constructed and [`UpdateError::Configuration`] for `file://` URLs that
/// do not map to a local path.
pub fn source_for(
    location: &str,
    options: &HttpOptions,
) -> Result<Box<dyn StreamSource>, UpdateError> {
    if let Ok(url) = reqwest::Url::parse(location) {
        match url.scheme() {
            "http" | "https" => {
                return Ok(Box::new(HttpSource::new(location.to_string(), options.clone())?));
            }
            "file" => {
                let path = url.to_file_path().map_err(|()| UpdateError::Configuration {
                    message: format!("'{location}' is not a usable file URL"),
                })?;
                return Ok(Box::new(FileSource::new(path)));
            }
            _ => {}
        }
    }
    Ok(Box::new(FileSource::new(location)))
}
