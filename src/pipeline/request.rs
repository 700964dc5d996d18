//! Request side of the pipeline contract.
//!
//! # Responsibilities
//! - Carry the inbound request (method, URI, headers) through the pipeline
//! - Own the body stream and its declared length
//! - Hold the optional diagnostics sink handlers and layers may write to
//!
//! # Design Decisions
//! - The context is owned by one invocation and never shared between requests
//! - The body source can be swapped by a layer (e.g. for a rewindable copy)

use std::fmt;
use std::io::{self, Read, Write};

use http::{header, HeaderMap, Method, Uri};

use crate::resilience::body::RewindableBody;

/// Append-only text sink for per-request diagnostics.
pub type Diagnostics = Box<dyn Write + Send>;

/// Body source presented to a handler.
pub enum RequestBody {
    /// No body was supplied.
    Empty,
    /// The original, read-once stream.
    Stream(Box<dyn Read + Send>),
    /// A buffered copy that can be replayed from offset 0.
    Rewindable(RewindableBody),
}

impl RequestBody {
    /// Seek back to the first byte of the body.
    pub fn rewind(&mut self) -> io::Result<()> {
        match self {
            RequestBody::Empty => Ok(()),
            RequestBody::Rewindable(body) => body.rewind(),
            RequestBody::Stream(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "request body stream cannot be rewound",
            )),
        }
    }

    pub fn is_rewindable(&self) -> bool {
        !matches!(self, RequestBody::Stream(_))
    }
}

impl Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RequestBody::Empty => Ok(0),
            RequestBody::Stream(stream) => stream.read(buf),
            RequestBody::Rewindable(body) => body.read(buf),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
            RequestBody::Rewindable(body) => f.debug_tuple("Rewindable").field(body).finish(),
        }
    }
}

/// Inbound request as seen by pipeline applications.
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    content_length: Option<u64>,
    body: RequestBody,
    diagnostics: Option<Diagnostics>,
}

impl RequestContext {
    /// Create a context with no headers, no body and no diagnostics sink.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            content_length: None,
            body: RequestBody::Empty,
            diagnostics: None,
        }
    }

    /// Create a context from `http` request parts.
    ///
    /// The declared body length is taken from the `Content-Length` header; a missing or
    /// malformed header leaves it undeclared.
    pub fn from_parts<R>(parts: http::request::Parts, body: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let content_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            content_length,
            body: RequestBody::Stream(Box::new(body)),
            diagnostics: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attach a body stream together with its declared length.
    pub fn with_body<R>(mut self, body: R, content_length: Option<u64>) -> Self
    where
        R: Read + Send + 'static,
    {
        self.body = RequestBody::Stream(Box::new(body));
        self.content_length = content_length;
        self
    }

    pub fn with_diagnostics<W>(mut self, sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.diagnostics = Some(Box::new(sink));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn body(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    /// Take the body source out, leaving an empty body behind.
    pub fn take_body(&mut self) -> RequestBody {
        std::mem::replace(&mut self.body, RequestBody::Empty)
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = body;
    }

    pub fn diagnostics(&mut self) -> Option<&mut (dyn Write + Send + 'static)> {
        self.diagnostics.as_deref_mut()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("content_length", &self.content_length)
            .field("body", &self.body)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}
