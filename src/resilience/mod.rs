//! Resilience subsystem: retrying applications that fail with transient errors.
//!
//! # Data Flow
//! ```text
//! Request into Retry::run:
//!     → body.rs (copy body once into a rewindable spill store)
//!     → per attempt: capture.rs (intercept head + early writes)
//!     → On failure: kinds.rs (is the error a retryable kind?)
//!         → retry: rewind body, fresh capture
//!         → give up: forward last capture, return the error
//!     → On success: forward capture, reconcile.rs (early chunks ++ body)
//! ```
//!
//! # Design Decisions
//! - Retry only while nothing has reached the caller
//! - The retry policy is immutable and shared via Arc
//! - Handlers own idempotency; the layer only replays the request

pub mod body;
pub mod capture;
pub mod conflict;
pub mod kinds;
pub mod reconcile;
pub mod retries;

pub use body::{BodySettings, RewindableBody};
pub use capture::{CaptureSink, CapturedResponse};
pub use conflict::{ReadConflict, WriteConflict};
pub use kinds::{ErrorKind, ErrorKindRegistry, KindError, RetryableKinds};
pub use reconcile::reconcile;
pub use retries::{Retry, RetryLayer, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
