//! Per-request diagnostics sink backed by `tracing`.
//!
//! The retry controller writes plain text lines to whatever sink the request carries. The
//! HTTP host attaches a [`TracingDiagnostics`] so those lines end up in the structured log,
//! tagged with the request ID.

use std::io::{self, Write};

/// Line-buffered writer that emits one `warn` event per line.
#[derive(Debug)]
pub struct TracingDiagnostics {
    request_id: String,
    pending: Vec<u8>,
}

impl TracingDiagnostics {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            pending: Vec::new(),
        }
    }

    fn emit(&self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            tracing::warn!(request_id = %self.request_id, "{line}");
        }
    }
}

impl Write for TracingDiagnostics {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..pos]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
        Ok(())
    }
}

impl Drop for TracingDiagnostics {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
