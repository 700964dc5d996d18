//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve retryable kind names against the registry
//! - Validate value ranges (tries >= 1, sizes > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::resilience::kinds::{ErrorKindRegistry, KindError};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("retry.tries must be at least 1")]
    ZeroTries,

    #[error("retry.retryable: {0}")]
    Retryable(#[from] KindError),

    #[error("body.chunk_size must be greater than 0")]
    ZeroChunkSize,

    #[error("listener.max_body_size must be greater than 0")]
    ZeroBodyLimit,

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroTimeout,

    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check `config` for semantic errors, resolving kind names through `registry`.
pub fn validate_config(
    config: &ServiceConfig,
    registry: &ErrorKindRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retry.tries == 0 {
        errors.push(ValidationError::ZeroTries);
    }

    if config.retry.retryable.is_empty() {
        errors.push(KindError::Empty.into());
    }
    for name in &config.retry.retryable {
        if registry.get(name.trim()).is_none() {
            errors.push(KindError::Unknown(name.clone()).into());
        }
    }

    if config.body.chunk_size == 0 {
        errors.push(ValidationError::ZeroChunkSize);
    }

    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    check_address(
        &mut errors,
        "listener.bind_address",
        &config.listener.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
