//! Archive Reader - turns a source locator into a decompressed byte stream
//!
//! Network archives are decompressed straight off the transfer stream; no
//! compressed or decompressed payload is ever materialized in full.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Suffix of zstd-compressed archives.
const ZSTD_SUFFIX: &str = ".zst";

/// Where an archive comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLocator {
    Path(PathBuf),
    Url(String),
}

impl SourceLocator {
    /// `http://` and `https://` locators are URLs, everything else a path.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceLocator::Url(raw.to_string())
        } else {
            SourceLocator::Path(PathBuf::from(raw))
        }
    }

    /// Identifier recorded by the run tracker: the file name for local
    /// archives, the full URL for network ones.
    pub fn source_id(&self) -> String {
        match self {
            SourceLocator::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SourceLocator::Url(url) => url.clone(),
        }
    }

    pub fn source_type(&self) -> &'static str {
        match self {
            SourceLocator::Path(_) => "file",
            SourceLocator::Url(_) => "http",
        }
    }

    pub fn is_compressed(&self) -> bool {
        match self {
            SourceLocator::Path(path) => path
                .to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(ZSTD_SUFFIX),
            SourceLocator::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.to_ascii_lowercase().ends_with(ZSTD_SUFFIX)
            }
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
            SourceLocator::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Counts bytes pulled from the file or transfer body, below any decoder.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Decompressed byte stream over one archive.
///
/// Tracks how many raw bytes arrived from the source so a failure can be
/// reported as `SourceUnavailable` (nothing arrived) or `CorruptStream`
/// (bytes arrived but could not be decoded or the transfer broke off).
pub struct ArchiveStream {
    source_id: String,
    inner: Box<dyn Read + Send>,
    bytes_read: u64,
    raw_bytes: Arc<AtomicU64>,
}

impl ArchiveStream {
    /// Stream over an uncompressed reader.
    pub fn new(source_id: impl Into<String>, inner: Box<dyn Read + Send>) -> Self {
        let raw_bytes = Arc::new(AtomicU64::new(0));
        let counted = CountingReader {
            inner,
            count: raw_bytes.clone(),
        };
        Self::with_raw_counter(source_id, Box::new(counted), raw_bytes)
    }

    fn with_raw_counter(
        source_id: impl Into<String>,
        inner: Box<dyn Read + Send>,
        raw_bytes: Arc<AtomicU64>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            inner,
            bytes_read: 0,
            raw_bytes,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Decompressed bytes handed to the parser.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Bytes received from the file or transfer body.
    pub fn raw_bytes_read(&self) -> u64 {
        self.raw_bytes.load(Ordering::Relaxed)
    }

    /// Map a read failure onto the error taxonomy.
    pub fn classify(&self, err: impl fmt::Display) -> RegistryError {
        let raw = self.raw_bytes_read();
        if raw == 0 {
            RegistryError::SourceUnavailable {
                source_id: self.source_id.clone(),
                reason: err.to_string(),
            }
        } else {
            RegistryError::CorruptStream {
                source_id: self.source_id.clone(),
                reason: format!(
                    "{} (after {} source bytes, {} decoded)",
                    err, raw, self.bytes_read
                ),
            }
        }
    }
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Open an archive for streaming.
///
/// Must not be called from inside an async task: network sources use the
/// blocking HTTP client. Only the connection phase is bounded by
/// `connect_timeout`; a stalled transfer blocks the caller.
pub fn open_archive(source: &SourceLocator, connect_timeout: Duration) -> Result<ArchiveStream> {
    let source_id = source.source_id();
    let raw: Box<dyn Read + Send> = match source {
        SourceLocator::Path(path) => Box::new(open_file(path, &source_id)?),
        SourceLocator::Url(url) => Box::new(open_url(url, connect_timeout, &source_id)?),
    };

    let raw_bytes = Arc::new(AtomicU64::new(0));
    let raw = CountingReader {
        inner: raw,
        count: raw_bytes.clone(),
    };

    let inner: Box<dyn Read + Send> = if source.is_compressed() {
        let decoder = zstd::stream::read::Decoder::new(raw).map_err(|e| {
            RegistryError::CorruptStream {
                source_id: source_id.clone(),
                reason: format!("Failed to initialise zstd decoder: {}", e),
            }
        })?;
        Box::new(decoder)
    } else {
        Box::new(raw)
    };

    debug!("Opened {} archive {}", source.source_type(), source);
    Ok(ArchiveStream::with_raw_counter(source_id, inner, raw_bytes))
}

fn open_file(path: &Path, source_id: &str) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| RegistryError::SourceUnavailable {
        source_id: source_id.to_string(),
        reason: format!("Failed to open {}: {}", path.display(), e),
    })?;
    Ok(BufReader::with_capacity(1 << 20, file))
}

fn open_url(
    url: &str,
    connect_timeout: Duration,
    source_id: &str,
) -> Result<reqwest::blocking::Response> {
    let unavailable = |reason: String| RegistryError::SourceUnavailable {
        source_id: source_id.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(None)
        .build()
        .map_err(|e| unavailable(format!("Failed to build HTTP client: {}", e)))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| unavailable(format!("Request failed: {}", e)))?;

    response
        .error_for_status()
        .map_err(|e| unavailable(format!("Server refused transfer: {}", e)))
}
