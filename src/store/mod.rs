//! Demo store: a conflict-prone application to run behind the retry layer.
//!
//! # Data Flow
//! ```text
//! POST /counters/{name}
//!     → counter.rs (parse delta, read snapshot)
//!     → versioned.rs (compare-and-set commit)
//!         → WriteConflict if another request committed first
//! ```

pub mod counter;
pub mod versioned;

pub use counter::{CounterApp, StoreError};
pub use versioned::{Versioned, VersionedStore};
