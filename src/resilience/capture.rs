//! Response interception for a single attempt.
//!
//! A [`CaptureSink`] stands in for the real response initiator while an attempt runs.
//! Nothing reaches the caller until the attempt's outcome is known; the controller then
//! forwards the captured head exactly once via [`CapturedResponse::forward`].

use std::io;

use bytes::Bytes;

use crate::pipeline::{ResponseHead, StartResponse, WriteBody};

/// Records what a handler announced and pushed during one attempt.
#[derive(Debug, Default)]
pub struct CaptureSink {
    head: Option<ResponseHead>,
    early_chunks: Vec<Bytes>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest head announced, if any.
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn early_chunks(&self) -> &[Bytes] {
        &self.early_chunks
    }

    /// End the attempt and hand over what was captured.
    pub fn finish(self) -> CapturedResponse {
        CapturedResponse {
            head: self.head,
            early_chunks: self.early_chunks,
        }
    }
}

impl StartResponse for CaptureSink {
    fn start_response(&mut self, head: ResponseHead) -> &mut dyn WriteBody {
        // Last call wins; early chunks keep accumulating.
        self.head = Some(head);
        self
    }
}

impl WriteBody for CaptureSink {
    fn write_body(&mut self, chunk: Bytes) -> io::Result<()> {
        self.early_chunks.push(chunk);
        Ok(())
    }
}

/// Outcome of one attempt's interception.
#[derive(Debug, Default)]
pub struct CapturedResponse {
    pub head: Option<ResponseHead>,
    pub early_chunks: Vec<Bytes>,
}

impl CapturedResponse {
    pub fn is_started(&self) -> bool {
        self.head.is_some()
    }

    /// Announce the captured head to the real initiator, if one was captured.
    ///
    /// Consumes the capture so it can only be forwarded once. Returns the early chunks,
    /// which the real acceptor never sees; they are replayed ahead of the response body.
    pub fn forward(self, start_response: &mut dyn StartResponse) -> Vec<Bytes> {
        if let Some(head) = self.head {
            start_response.start_response(head);
        }
        self.early_chunks
    }
}
