//! Counter application over the versioned store.
//!
//! # Routes
//! - `GET /counters`: every counter
//! - `GET /counters/{name}`: one counter
//! - `POST /counters/{name}`: add `{"delta": n}` (default 1) with an optimistic commit
//!
//! A commit that loses a race returns `WriteConflict` as the application error; the
//! application itself never retries.

use std::io::Read;
use std::thread;

use http::{header, HeaderValue, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::{
    chunks, Application, BoxError, RequestContext, ResponseBody, ResponseHead, StartResponse,
};
use crate::store::versioned::VersionedStore;

/// Failures that are neither conflicts nor client mistakes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read request body: {0}")]
    Body(#[from] std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Increment {
    #[serde(default = "default_delta")]
    delta: i64,
}

fn default_delta() -> i64 {
    1
}

/// Pipeline application exposing counters stored in a [`VersionedStore`].
#[derive(Debug, Clone)]
pub struct CounterApp {
    store: VersionedStore,
}

impl CounterApp {
    pub fn new(store: VersionedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    fn increment(
        &self,
        name: &str,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        let mut raw = Vec::new();
        ctx.body()
            .read_to_end(&mut raw)
            .map_err(StoreError::Body)?;

        let increment = if raw.iter().all(u8::is_ascii_whitespace) {
            Increment {
                delta: default_delta(),
            }
        } else {
            match serde_json::from_slice::<Increment>(&raw) {
                Ok(increment) => increment,
                Err(e) => {
                    return respond(
                        start_response,
                        StatusCode::BAD_REQUEST,
                        json!({ "error": e.to_string() }),
                    )
                }
            }
        };

        let snapshot = self.store.read(name);
        let delay = self.store.contention_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let committed = self.store.commit(
            name,
            snapshot.version,
            snapshot.value.saturating_add(increment.delta),
        )?;

        respond(
            start_response,
            StatusCode::OK,
            json!({ "name": name, "value": committed.value, "version": committed.version }),
        )
    }
}

impl Application for CounterApp {
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        let path = ctx.uri().path().trim_end_matches('/').to_string();
        let method = ctx.method().clone();

        if path == "/counters" {
            if method != Method::GET {
                return method_not_allowed(start_response, "GET");
            }
            let all = serde_json::to_value(self.store.snapshot()).map_err(StoreError::Encode)?;
            return respond(start_response, StatusCode::OK, all);
        }

        let name = match path.strip_prefix("/counters/") {
            Some(name) if !name.is_empty() && !name.contains('/') => name,
            _ => {
                return respond(
                    start_response,
                    StatusCode::NOT_FOUND,
                    json!({ "error": "not found" }),
                )
            }
        };

        match method {
            Method::GET => {
                let current = self.store.read(name);
                respond(
                    start_response,
                    StatusCode::OK,
                    json!({ "name": name, "value": current.value, "version": current.version }),
                )
            }
            Method::POST => self.increment(name, ctx, start_response),
            _ => method_not_allowed(start_response, "GET, POST"),
        }
    }
}

fn respond(
    start_response: &mut dyn StartResponse,
    status: StatusCode,
    body: serde_json::Value,
) -> Result<ResponseBody, BoxError> {
    let encoded = serde_json::to_vec(&body).map_err(StoreError::Encode)?;
    start_response.start_response(ResponseHead::new(status).header(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    ));
    Ok(chunks([encoded]))
}

fn method_not_allowed(
    start_response: &mut dyn StartResponse,
    allow: &'static str,
) -> Result<ResponseBody, BoxError> {
    start_response.start_response(
        ResponseHead::new(StatusCode::METHOD_NOT_ALLOWED)
            .header(header::ALLOW, HeaderValue::from_static(allow)),
    );
    Ok(chunks(Vec::<Vec<u8>>::new()))
}
