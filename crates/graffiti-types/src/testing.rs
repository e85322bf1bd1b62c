//! A scripted [`HttpClient`] for exercising clients without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};

use crate::error::{GraffitiError, GraffitiResult};
use crate::http::{ChunkedBody, HttpClient, HttpRequest, HttpResponse};

/// One canned response.
#[derive(Clone, Debug)]
pub struct ScriptedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    chunk_size: usize,
}

impl ScriptedResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            chunk_size: 64,
        }
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Deliver the body in reads of `size` bytes.
    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }
}

/// Replays queued responses in order and records every request it is sent.
/// Sending with nothing queued is a transport error.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.responses
            .lock()
            .expect("lock poisoned")
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn send(&self, request: HttpRequest) -> GraffitiResult<HttpResponse> {
        self.requests.lock().expect("lock poisoned").push(request);
        let next = self.responses.lock().expect("lock poisoned").pop_front();
        let response = next
            .ok_or_else(|| GraffitiError::Transport("no scripted response left".into()))?;
        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: Box::new(ChunkedBody::split(response.body, response.chunk_size)),
        })
    }
}
