//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::StatusCode;

use conflict_retry::pipeline::{
    chunks, Application, BoxError, RequestContext, ResponseBody, ResponseHead, StartResponse,
    WriteBody,
};
use conflict_retry::resilience::WriteConflict;

/// Diagnostics sink whose contents stay readable after the request consumed it.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn retry_lines(&self) -> Vec<String> {
        self.text()
            .lines()
            .filter(|line| line.starts_with("retrying, count = "))
            .map(str::to_string)
            .collect()
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

/// Real response initiator that records every call.
#[derive(Default)]
pub struct RecordingInitiator {
    pub heads: Vec<ResponseHead>,
    pub written: Vec<Bytes>,
}

impl StartResponse for RecordingInitiator {
    fn start_response(&mut self, head: ResponseHead) -> &mut dyn WriteBody {
        self.heads.push(head);
        self
    }
}

impl WriteBody for RecordingInitiator {
    fn write_body(&mut self, chunk: Bytes) -> io::Result<()> {
        self.written.push(chunk);
        Ok(())
    }
}

/// Non-retryable failure.
#[derive(Debug, thiserror::Error)]
#[error("boom")]
pub struct Boom;

/// What the scripted application does on one attempt.
pub enum Step {
    Conflict,
    StartThenConflict(StatusCode),
    Fatal,
    StartThenFatal(StatusCode),
    Fail(BoxError),
    Succeed {
        status: StatusCode,
        early: Vec<&'static str>,
        chunks: Vec<&'static str>,
    },
}

impl Step {
    pub fn ok(chunks: Vec<&'static str>) -> Self {
        Step::Succeed {
            status: StatusCode::OK,
            early: Vec::new(),
            chunks,
        }
    }
}

/// Application that follows a script, one step per call, recording the body each call saw.
pub struct ScriptedApp {
    steps: Mutex<VecDeque<Step>>,
    bodies: Mutex<Vec<Vec<u8>>>,
    calls: AtomicU32,
}

impl ScriptedApp {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            bodies: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

impl Application for ScriptedApp {
    fn call(
        &self,
        ctx: &mut RequestContext,
        start_response: &mut dyn StartResponse,
    ) -> Result<ResponseBody, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut body = Vec::new();
        ctx.body().read_to_end(&mut body)?;
        self.bodies.lock().unwrap().push(body);

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted");

        match step {
            Step::Conflict => Err(conflict()),
            Step::StartThenConflict(status) => {
                start_response
                    .start_response(ResponseHead::new(status))
                    .write_body(Bytes::from_static(b"partial"))?;
                Err(conflict())
            }
            Step::Fatal => Err(Box::new(Boom)),
            Step::StartThenFatal(status) => {
                start_response.start_response(ResponseHead::new(status));
                Err(Box::new(Boom))
            }
            Step::Fail(error) => Err(error),
            Step::Succeed {
                status,
                early,
                chunks: returned,
            } => {
                let writer = start_response.start_response(ResponseHead::new(status));
                for chunk in early {
                    writer.write_body(Bytes::from_static(chunk.as_bytes()))?;
                }
                Ok(chunks(returned))
            }
        }
    }
}

pub fn conflict() -> BoxError {
    Box::new(WriteConflict::new("counter", 1, 2))
}

pub fn collect(body: ResponseBody) -> Vec<Bytes> {
    body.collect::<io::Result<Vec<_>>>().unwrap()
}
