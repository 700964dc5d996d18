//! Rewindable request body.
//!
//! # Responsibilities
//! - Read the declared number of body bytes from the original stream, once
//! - Keep them in a spill store (memory, then an anonymous temp file)
//! - Replay them from offset 0 for every attempt
//!
//! # Design Decisions
//! - Undeclared or zero length means an empty body; the source is left untouched
//! - Bytes past the declared length are never read
//! - A source that ends early is an error, not a silently truncated body

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;

use crate::config::schema::BodyConfig;
use crate::observability::metrics;

/// Default read size when copying the original body.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Default in-memory limit before the copy spills to disk.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 1 << 20;

/// How request bodies are buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySettings {
    /// Bytes requested from the original stream per read.
    pub chunk_size: usize,
    /// Bytes kept in memory before spilling to a temp file.
    pub spool_threshold: usize,
}

impl Default for BodySettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

impl From<&BodyConfig> for BodySettings {
    fn from(config: &BodyConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            spool_threshold: config.spool_threshold,
        }
    }
}

/// Byte-for-byte copy of a request body that can be read again from the start.
pub struct RewindableBody {
    spool: Option<SpooledTempFile>,
    len: u64,
}

impl RewindableBody {
    /// A body with no bytes.
    pub fn empty() -> Self {
        Self { spool: None, len: 0 }
    }

    /// Copy `declared_len` bytes from `source` into a spill store positioned at offset 0.
    pub fn prepare<R>(
        source: &mut R,
        declared_len: Option<u64>,
        settings: &BodySettings,
    ) -> io::Result<Self>
    where
        R: Read + ?Sized,
    {
        let len = match declared_len {
            None | Some(0) => return Ok(Self::empty()),
            Some(len) => len,
        };

        let chunk_size = settings.chunk_size.max(1);
        let buf_len = usize::try_from(len).map_or(chunk_size, |len| len.min(chunk_size));
        let mut buf = vec![0u8; buf_len];
        let mut spool = SpooledTempFile::new(settings.spool_threshold);
        let mut remaining = len;

        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(buf_len, |r| r.min(buf_len));
            let read = match source.read(&mut buf[..want]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "request body ended after {} of {} declared bytes",
                            len - remaining,
                            len
                        ),
                    ));
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            spool.write_all(&buf[..read])?;
            remaining -= read as u64;
        }

        spool.seek(SeekFrom::Start(0))?;

        if spool.is_rolled() {
            tracing::debug!(bytes = len, "Request body spilled to temporary file");
            metrics::record_body_spill();
        }

        Ok(Self {
            spool: Some(spool),
            len,
        })
    }

    /// Reposition at the first byte without touching the original source.
    pub fn rewind(&mut self) -> io::Result<()> {
        if let Some(spool) = self.spool.as_mut() {
            spool.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the copy moved from memory to a temp file.
    pub fn is_spilled(&self) -> bool {
        self.spool.as_ref().is_some_and(|s| s.is_rolled())
    }
}

impl Read for RewindableBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.spool.as_mut() {
            Some(spool) => spool.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for RewindableBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewindableBody")
            .field("len", &self.len)
            .field("spilled", &self.is_spilled())
            .finish()
    }
}
