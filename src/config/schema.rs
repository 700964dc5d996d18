//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::resilience::body::{DEFAULT_CHUNK_SIZE, DEFAULT_SPOOL_THRESHOLD};
use crate::resilience::kinds::WRITE_CONFLICT;
use crate::resilience::retries::DEFAULT_MAX_ATTEMPTS;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Request body buffering.
    pub body: BodyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Demo store settings.
    pub store: StoreConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body accepted, in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per request, including the first.
    pub tries: u32,

    /// Names of the error kinds that trigger a retry.
    pub retryable: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tries: DEFAULT_MAX_ATTEMPTS,
            retryable: vec![WRITE_CONFLICT.to_string()],
        }
    }
}

/// Request body buffering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Bytes read from the client per chunk.
    pub chunk_size: usize,

    /// Bytes kept in memory before the body spills to a temp file.
    pub spool_threshold: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds, covering every attempt.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directives, used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "conflict_retry=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Demo store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Simulated work between reading and committing, in milliseconds.
    /// Widens the window in which concurrent writers conflict.
    pub contention_delay_ms: u64,
}
