//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Retry controller, HTTP host, store produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters)
//!     → diagnostics.rs (per-request retry notes, re-emitted as tracing events)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings, for anything worth filtering on
//! - Metrics are cheap (no-ops until a recorder is installed)
//! - Request ID flows into every diagnostics line

pub mod diagnostics;
pub mod logging;
pub mod metrics;

pub use diagnostics::TracingDiagnostics;
