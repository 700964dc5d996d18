//! Synchronous request/response pipeline contract.
//!
//! # Data Flow
//! ```text
//! host (HTTP server, test harness)
//!     → RequestContext (request + body + diagnostics)
//!     → Application::call(ctx, start_response)
//!         → handler announces ResponseHead via StartResponse
//!         → handler may push early bytes through WriteBody
//!     → ResponseBody (lazy chunk iterator) returned to the host
//! ```
//!
//! # Design Decisions
//! - Calls are blocking; the host decides which thread runs them
//! - Errors travel as `BoxError` so layers can pass them through unchanged
//! - Layers are applications wrapping applications

pub mod request;
pub mod response;

pub use request::{Diagnostics, RequestBody, RequestContext};
pub use response::{ErrorContext, ResponseBody, ResponseHead, StartResponse, WriteBody};

/// Error type returned by pipeline applications.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A request handler in the pipeline.
pub trait Application: Send + Sync {
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError>;
}

impl<A> Application for std::sync::Arc<A>
where
    A: Application + ?Sized,
{
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        (**self).call(ctx, start_response)
    }
}

impl<A> Application for Box<A>
where
    A: Application + ?Sized,
{
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        (**self).call(ctx, start_response)
    }
}

/// Application built from a closure. See [`application_fn`].
#[derive(Clone, Copy)]
pub struct ApplicationFn<F> {
    f: F,
}

/// Wrap a closure as an [`Application`].
pub fn application_fn<F>(f: F) -> ApplicationFn<F>
where
    F: Fn(&mut RequestContext, &mut dyn StartResponse) -> Result<ResponseBody, BoxError>
        + Send
        + Sync,
{
    ApplicationFn { f }
}

impl<F> Application for ApplicationFn<F>
where
    F: Fn(&mut RequestContext, &mut dyn StartResponse) -> Result<ResponseBody, BoxError>
        + Send
        + Sync,
{
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        (self.f)(ctx, start_response)
    }
}

/// Build a [`ResponseBody`] from an in-memory list of chunks.
pub fn chunks<I, B>(chunks: I) -> ResponseBody
where
    I: IntoIterator<Item = B>,
    I::IntoIter: Send + 'static,
    B: Into<bytes::Bytes> + 'static,
{
    Box::new(
        chunks
            .into_iter()
            .map(|chunk| Ok::<bytes::Bytes, std::io::Error>(chunk.into())),
    )
}
