//! Error kinds and retry classification.
//!
//! # Responsibilities
//! - Identify an error kind by its concrete Rust type
//! - Decide whether a raised error belongs to the configured retryable set
//! - Resolve configuration names into kinds at startup
//!
//! # Design Decisions
//! - Classification is exact type matching (`<dyn Error>::is`), never message inspection
//! - Names exist only at the configuration boundary; the retry loop sees resolved kinds
//! - The retryable set is non-empty by construction

use std::any::TypeId;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

use crate::resilience::conflict::{ReadConflict, WriteConflict};

/// Configuration name of the built-in [`WriteConflict`] kind.
pub const WRITE_CONFLICT: &str = "write-conflict";

/// Configuration name of the built-in [`ReadConflict`] kind.
pub const READ_CONFLICT: &str = "read-conflict";

/// A class of errors, identified by concrete type.
#[derive(Clone, Copy)]
pub struct ErrorKind {
    type_id: TypeId,
    type_name: &'static str,
    matches: fn(&(dyn StdError + 'static)) -> bool,
}

fn is_instance<E>(error: &(dyn StdError + 'static)) -> bool
where
    E: StdError + 'static,
{
    error.is::<E>()
}

impl ErrorKind {
    /// The kind of every error whose concrete type is `E`.
    pub fn of<E>() -> Self
    where
        E: StdError + 'static,
    {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            matches: is_instance::<E>,
        }
    }

    pub fn write_conflict() -> Self {
        Self::of::<WriteConflict>()
    }

    pub fn read_conflict() -> Self {
        Self::of::<ReadConflict>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn matches(&self, error: &(dyn StdError + 'static)) -> bool {
        (self.matches)(error)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ErrorKind {}

impl Hash for ErrorKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorKind").field(&self.type_name).finish()
    }
}

/// Non-empty set of error kinds that trigger a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableKinds {
    kinds: Vec<ErrorKind>,
}

impl RetryableKinds {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kinds: vec![kind] }
    }

    /// Add another kind; duplicates are ignored.
    pub fn with(mut self, kind: ErrorKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    pub fn contains(&self, kind: &ErrorKind) -> bool {
        self.kinds.contains(kind)
    }

    /// Whether `error` is an instance of one of the kinds.
    pub fn is_retryable(&self, error: &(dyn StdError + 'static)) -> bool {
        self.kinds.iter().any(|kind| kind.matches(error))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorKind> {
        self.kinds.iter()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for RetryableKinds {
    fn default() -> Self {
        Self::new(ErrorKind::write_conflict())
    }
}

/// Failure to resolve configured kind names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KindError {
    #[error("unknown error kind `{0}`")]
    Unknown(String),

    #[error("at least one retryable error kind is required")]
    Empty,
}

/// Maps configuration names to error kinds.
#[derive(Debug, Clone)]
pub struct ErrorKindRegistry {
    kinds: HashMap<String, ErrorKind>,
}

impl ErrorKindRegistry {
    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Register `E` under `name`, returning the kind it replaced.
    pub fn register<E>(&mut self, name: impl Into<String>) -> Option<ErrorKind>
    where
        E: StdError + 'static,
    {
        self.kinds.insert(name.into(), ErrorKind::of::<E>())
    }

    pub fn get(&self, name: &str) -> Option<ErrorKind> {
        self.kinds.get(name).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve names into a retryable set. Every name must be registered.
    pub fn resolve<I, S>(&self, names: I) -> Result<RetryableKinds, KindError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved: Option<RetryableKinds> = None;
        for name in names {
            let name = name.as_ref().trim();
            let kind = self
                .get(name)
                .ok_or_else(|| KindError::Unknown(name.to_string()))?;
            resolved = Some(match resolved {
                Some(kinds) => kinds.with(kind),
                None => RetryableKinds::new(kind),
            });
        }
        resolved.ok_or(KindError::Empty)
    }
}

impl Default for ErrorKindRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register::<WriteConflict>(WRITE_CONFLICT);
        registry.register::<ReadConflict>(READ_CONFLICT);
        registry
    }
}
