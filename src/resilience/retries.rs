//! Retry controller.
//!
//! # Responsibilities
//! - Buffer the request body once and replay it for every attempt
//! - Run the inner application against a fresh capture sink per attempt
//! - Classify failures and decide between retrying and giving up
//! - Forward the surviving capture to the real initiator exactly once
//!
//! # State Transitions
//! ```text
//! Attempting(n) → Attempting(n+1): retryable error, n+1 < max_attempts
//! Attempting(n) → Exhausted:       retryable error, n+1 == max_attempts
//! Attempting(n) → Failed:          any other error (or the body cannot be rewound)
//! Attempting(n) → Succeeded:       application returned a body
//! ```
//!
//! # Design Decisions
//! - Attempts run back to back on the calling thread; no backoff, no concurrency
//! - Nothing is retried once the caller holds the response body
//! - Diagnostics are best-effort; a failing sink never changes the outcome

use std::error::Error as StdError;
use std::io::{self, Write};
use std::sync::Arc;

use crate::config::schema::{BodyConfig, RetryConfig};
use crate::observability::metrics;
use crate::pipeline::{
    Application, BoxError, RequestBody, RequestContext, ResponseBody, StartResponse,
};
use crate::resilience::body::{BodySettings, RewindableBody};
use crate::resilience::capture::{CaptureSink, CapturedResponse};
use crate::resilience::kinds::{ErrorKindRegistry, KindError, RetryableKinds};
use crate::resilience::reconcile::reconcile;

/// Attempts made when nothing else is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Immutable retry parameters, shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    retryable: RetryableKinds,
    body: BodySettings,
}

impl RetryPolicy {
    /// Allow up to `max_attempts` attempts (at least one) for errors in `retryable`.
    pub fn new(max_attempts: u32, retryable: RetryableKinds) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retryable,
            body: BodySettings::default(),
        }
    }

    pub fn with_body_settings(mut self, body: BodySettings) -> Self {
        self.body = body;
        self
    }

    /// Build a policy from configuration, resolving kind names through `registry`.
    pub fn from_config(
        retry: &RetryConfig,
        body: &BodyConfig,
        registry: &ErrorKindRegistry,
    ) -> Result<Self, KindError> {
        let retryable = registry.resolve(&retry.retryable)?;
        Ok(Self::new(retry.tries, retryable).with_body_settings(BodySettings::from(body)))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retryable(&self) -> &RetryableKinds {
        &self.retryable
    }

    pub fn body_settings(&self) -> &BodySettings {
        &self.body
    }

    pub fn is_retryable(&self, error: &(dyn StdError + 'static)) -> bool {
        self.retryable.is_retryable(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, RetryableKinds::default())
    }
}

/// Wraps applications in [`Retry`].
#[derive(Debug, Clone)]
pub struct RetryLayer {
    policy: Arc<RetryPolicy>,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }
}

impl<A> tower::Layer<A> for RetryLayer {
    type Service = Retry<A>;

    fn layer(&self, inner: A) -> Self::Service {
        Retry::with_shared_policy(inner, self.policy.clone())
    }
}

/// Application that re-runs `inner` when it fails with a retryable error.
#[derive(Debug, Clone)]
pub struct Retry<A> {
    inner: A,
    policy: Arc<RetryPolicy>,
}

enum State {
    /// Number of attempts that already failed.
    Attempting(u32),
    Succeeded {
        captured: CapturedResponse,
        body: ResponseBody,
    },
    Exhausted {
        captured: CapturedResponse,
        error: BoxError,
        attempts: u32,
    },
    Failed {
        captured: CapturedResponse,
        error: BoxError,
        attempts: u32,
    },
}

impl<A> Retry<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self::with_shared_policy(inner, Arc::new(policy))
    }

    pub fn with_shared_policy(inner: A, policy: Arc<RetryPolicy>) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn get_ref(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A> Retry<A>
where
    A: Application,
{
    /// Run the request, retrying retryable failures up to the policy's attempt limit.
    ///
    /// On success the real initiator sees the final attempt's head once and the returned
    /// body yields that attempt's early chunks followed by its body. On failure the last
    /// attempt's head, if any, is forwarded before the error is returned.
    pub fn run(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        let mut source = ctx.take_body();
        let body =
            RewindableBody::prepare(&mut source, ctx.content_length(), &self.policy.body)?;
        drop(source);
        ctx.set_body(RequestBody::Rewindable(body));

        let mut state = State::Attempting(0);
        loop {
            state = match state {
                State::Attempting(failures) => self.attempt(ctx, failures),
                State::Succeeded { captured, body } => {
                    metrics::record_outcome("succeeded");
                    let early = captured.forward(start_response);
                    return Ok(reconcile(early, body));
                }
                State::Exhausted {
                    captured,
                    error,
                    attempts,
                } => {
                    tracing::warn!(attempts, error = %error, "Retryable error persisted, giving up");
                    metrics::record_outcome("exhausted");
                    captured.forward(start_response);
                    return Err(error);
                }
                State::Failed {
                    captured,
                    error,
                    attempts,
                } => {
                    tracing::debug!(attempts, error = %error, "Request failed with non-retryable error");
                    metrics::record_outcome("failed");
                    captured.forward(start_response);
                    return Err(error);
                }
            };
        }
    }

    fn attempt(&self, ctx: &mut RequestContext, failures: u32) -> State {
        let attempt = failures + 1;
        metrics::record_attempt();

        let mut sink = CaptureSink::new();
        let result = self.inner.call(ctx, &mut sink);
        let captured = sink.finish();

        let error = match result {
            Ok(body) => return State::Succeeded { captured, body },
            Err(error) => error,
        };

        if !self.policy.is_retryable(&*error) {
            return State::Failed {
                captured,
                error,
                attempts: attempt,
            };
        }

        if attempt >= self.policy.max_attempts {
            return State::Exhausted {
                captured,
                error,
                attempts: attempt,
            };
        }

        tracing::info!(
            attempt,
            max_attempts = self.policy.max_attempts,
            error = %error,
            "Retrying after retryable error"
        );
        metrics::record_retry();

        if let Some(sink) = ctx.diagnostics() {
            if let Err(e) = write_retry_note(sink, attempt, &*error) {
                tracing::debug!(error = %e, "Failed to write retry diagnostics");
            }
        }

        match ctx.body().rewind() {
            Ok(()) => State::Attempting(attempt),
            Err(e) => State::Failed {
                captured,
                error: e.into(),
                attempts: attempt,
            },
        }
    }
}

impl<A> Application for Retry<A>
where
    A: Application,
{
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        self.run(ctx, start_response)
    }
}

/// One `retrying` line, then the error and its causes.
fn write_retry_note<W>(sink: &mut W, count: u32, error: &(dyn StdError + 'static)) -> io::Result<()>
where
    W: Write + ?Sized,
{
    writeln!(sink, "retrying, count = {count}")?;
    writeln!(sink, "{error}")?;
    let mut source = error.source();
    while let Some(cause) = source {
        writeln!(sink, "  caused by: {cause}")?;
        source = cause.source();
    }
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{application_fn, chunks, ResponseHead};
    use crate::resilience::conflict::WriteConflict;
    use http::{Method, StatusCode, Uri};
    use std::io::Read;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("sink closed"))
        }
    }

    #[derive(Default)]
    struct Heads(Vec<ResponseHead>);

    impl StartResponse for Heads {
        fn start_response(&mut self, head: ResponseHead) -> &mut dyn crate::pipeline::WriteBody {
            self.0.push(head);
            self
        }
    }

    impl crate::pipeline::WriteBody for Heads {
        fn write_body(&mut self, _: bytes::Bytes) -> io::Result<()> {
            Ok(())
        }
    }

    fn always_conflicting(calls: Arc<AtomicU32>) -> impl Application {
        application_fn(move |_ctx, _start| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Box::new(WriteConflict::new("k", 1, 2)) as BoxError)
        })
    }

    fn request(diagnostics: impl Write + Send + 'static) -> RequestContext {
        RequestContext::new(Method::POST, Uri::from_static("/")).with_diagnostics(diagnostics)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.is_retryable(&WriteConflict::new("k", 0, 1)));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, RetryableKinds::default()).max_attempts(), 1);
    }

    #[test]
    fn test_single_attempt_writes_no_diagnostics() {
        let calls = Arc::new(AtomicU32::new(0));
        let diagnostics = SharedBuf::default();
        let retry = Retry::new(
            always_conflicting(calls.clone()),
            RetryPolicy::new(1, RetryableKinds::default()),
        );

        let err = retry
            .run(&mut request(diagnostics.clone()), &mut Heads::default())
            .err()
            .unwrap();

        assert!(err.is::<WriteConflict>());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(diagnostics.text(), "");
    }

    #[test]
    fn test_two_attempts_write_one_note() {
        let calls = Arc::new(AtomicU32::new(0));
        let diagnostics = SharedBuf::default();
        let retry = Retry::new(
            always_conflicting(calls.clone()),
            RetryPolicy::new(2, RetryableKinds::default()),
        );

        assert!(retry
            .run(&mut request(diagnostics.clone()), &mut Heads::default())
            .is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let text = diagnostics.text();
        assert_eq!(text.matches("retrying, count = ").count(), 1);
        assert!(text.starts_with("retrying, count = 1\n"));
        assert!(text.contains("write conflict on `k`"));
    }

    #[test]
    fn test_broken_diagnostics_sink_does_not_change_outcome() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = application_fn(move |_ctx, start| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Box::new(WriteConflict::new("k", 1, 2)) as BoxError);
            }
            start.start_response(ResponseHead::new(StatusCode::OK));
            Ok(chunks(vec!["done"]))
        });
        let retry = Retry::new(app, RetryPolicy::default());

        let mut heads = Heads::default();
        let body = retry.run(&mut request(BrokenSink), &mut heads).unwrap();

        assert_eq!(body.count(), 1);
        assert_eq!(heads.0.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unrewindable_body_fails_instead_of_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = application_fn(move |ctx, _start| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.set_body(RequestBody::Stream(Box::new(io::empty())));
            Err(Box::new(WriteConflict::new("k", 1, 2)) as BoxError)
        });
        let retry = Retry::new(app, RetryPolicy::default());

        let err = retry
            .run(&mut request(SharedBuf::default()), &mut Heads::default())
            .err()
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let io_err = err.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_body_buffering_failure_is_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(always_conflicting(calls.clone()), RetryPolicy::default());
        let mut ctx = RequestContext::new(Method::POST, Uri::from_static("/"))
            .with_body(io::Cursor::new(b"abc".to_vec()), Some(10));

        let err = retry.run(&mut ctx, &mut Heads::default()).err().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            err.downcast_ref::<io::Error>().unwrap().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_layer_wraps_application() {
        use tower::Layer;

        let layer = RetryLayer::new(RetryPolicy::new(5, RetryableKinds::default()));
        let calls = Arc::new(AtomicU32::new(0));
        let retry = layer.layer(always_conflicting(calls.clone()));
        assert_eq!(retry.policy().max_attempts(), 5);

        let mut ctx = RequestContext::new(Method::GET, Uri::from_static("/"));
        assert!(retry.call(&mut ctx, &mut Heads::default()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let mut body = String::new();
        ctx.body().read_to_string(&mut body).unwrap();
        assert!(body.is_empty());
    }
}
