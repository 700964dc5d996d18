//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit, timeout)
//!     → request.rs (request ID generation and lookup)
//!     → pipeline application on the blocking pool (usually Retry<...>)
//!     → response.rs (head + chunks → Response, errors → status codes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
