//! Conflict retry layer for synchronous request pipelines.
//!
//! A [`Retry`] wraps a pipeline [`Application`]. When the application fails with a
//! retryable error (a write conflict by default), the request is replayed: the body is
//! rewound from a spooled copy and the response head is held back until an attempt
//! succeeds or the attempt budget runs out.

pub mod config;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod store;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use pipeline::{Application, BoxError, RequestContext, ResponseBody, StartResponse};
pub use resilience::{ErrorKindRegistry, Retry, RetryLayer, RetryPolicy, WriteConflict};
