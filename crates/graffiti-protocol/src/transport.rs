//! [`HttpClient`] backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use graffiti_types::{BodyReader, GraffitiError, GraffitiResult, HttpClient, HttpRequest, HttpResponse};

/// Sends requests over the network, optionally authenticated with a bearer
/// token.
#[derive(Clone, Debug, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
    bearer: Option<String>,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> GraffitiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraffitiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> GraffitiResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| GraffitiError::Transport(e.to_string()))?;
        Ok(HttpResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: Box::new(ReqwestBody {
                response: Some(response),
            }),
        })
    }
}

/// Response body read one network chunk at a time. Dropping the inner
/// response closes the connection.
struct ReqwestBody {
    response: Option<reqwest::Response>,
}

#[async_trait]
impl BodyReader for ReqwestBody {
    async fn read_chunk(&mut self) -> GraffitiResult<Option<Bytes>> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        let chunk = response
            .chunk()
            .await
            .map_err(|e| GraffitiError::Transport(e.to_string()))?;
        if chunk.is_none() {
            self.response = None;
        }
        Ok(chunk)
    }

    fn release(&mut self) {
        self.response = None;
    }
}
