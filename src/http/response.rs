//! Turning pipeline output into HTTP responses.
//!
//! # Responsibilities
//! - Act as the real response initiator for the pipeline
//! - Assemble status, headers and chunks into an axum `Response`
//! - Map pipeline failures to HTTP status codes
//!
//! # Design Decisions
//! - Headers keep the order and duplicates the application announced
//! - Bytes written through the initiator's acceptor precede the returned body

use std::io;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::pipeline::{ResponseHead, StartResponse, WriteBody};

/// Real response initiator used by the HTTP host.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    head: Option<ResponseHead>,
    written: Vec<Bytes>,
}

impl ResponseRecorder {
    pub fn is_started(&self) -> bool {
        self.head.is_some()
    }

    pub fn into_parts(self) -> (Option<ResponseHead>, Vec<Bytes>) {
        (self.head, self.written)
    }
}

impl StartResponse for ResponseRecorder {
    fn start_response(&mut self, head: ResponseHead) -> &mut dyn WriteBody {
        self.head = Some(head);
        self
    }
}

impl WriteBody for ResponseRecorder {
    fn write_body(&mut self, chunk: Bytes) -> io::Result<()> {
        self.written.push(chunk);
        Ok(())
    }
}

/// Build the HTTP response for a completed pipeline call.
pub fn into_response(head: ResponseHead, chunks: Vec<Bytes>) -> Response {
    let stream = futures_util::stream::iter(chunks.into_iter().map(Ok::<Bytes, io::Error>));
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = head.status;

    let headers = response.headers_mut();
    for (name, value) in head.headers {
        headers.append(name, value);
    }
    response
}

/// Plain-text error response.
pub fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}
