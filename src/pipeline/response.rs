//! Response side of the pipeline contract.
//!
//! # Responsibilities
//! - Describe the response head a handler announces (status, headers, error context)
//! - Define the response-initiation entry point handed to every handler
//! - Define the lazy body sequence a handler returns
//!
//! # Design Decisions
//! - Headers are an ordered list of pairs, duplicates allowed, insertion order kept
//! - The body is a boxed iterator so nothing is produced until the caller pulls it

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};

/// Lazy, finite, non-restartable sequence of response body chunks.
pub type ResponseBody = Box<dyn Iterator<Item = io::Result<Bytes>> + Send>;

/// In-flight error a handler wants the outer channel to observe while starting a response.
#[derive(Clone)]
pub struct ErrorContext(Arc<dyn StdError + Send + Sync>);

impl ErrorContext {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorContext").field(&self.0.to_string()).finish()
    }
}

/// Status line and headers announced by a handler.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub error_context: Option<ErrorContext>,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            error_context: None,
        }
    }

    /// Append a header, keeping any earlier value with the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn with_error_context(mut self, context: ErrorContext) -> Self {
        self.error_context = Some(context);
        self
    }
}

/// Acceptor for body bytes pushed eagerly, before the handler returns its body.
pub trait WriteBody {
    fn write_body(&mut self, chunk: Bytes) -> io::Result<()>;
}

/// Response-initiation entry point.
///
/// A handler calls [`start_response`](StartResponse::start_response) to announce its status
/// and headers, and may push bytes through the returned acceptor before returning its body.
pub trait StartResponse {
    fn start_response(&mut self, head: ResponseHead) -> &mut dyn WriteBody;
}
