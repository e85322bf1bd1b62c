//! An [`HttpClient`] that dispatches straight into a router.

use async_trait::async_trait;
use axum::body::{Body, BodyDataStream};
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use tower::ServiceExt;

use graffiti_protocol::encode_component;
use graffiti_types::{BodyReader, GraffitiError, GraffitiResult, HttpClient, HttpRequest, HttpResponse};

/// Serves requests with an in-process router instead of the network. The
/// scheme and authority of request urls are ignored.
#[derive(Clone)]
pub struct InProcessClient {
    router: Router,
    actor: Option<String>,
}

impl InProcessClient {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            actor: None,
        }
    }

    /// Authenticate every request as `actor`.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

impl std::fmt::Debug for InProcessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessClient")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

/// The path and query of an absolute url.
fn path_and_query(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    match rest.find(['/', '?']) {
        Some(start) if rest[start..].starts_with('?') => format!("/{}", &rest[start..]),
        Some(start) => rest[start..].to_string(),
        None => "/".to_string(),
    }
}

#[async_trait]
impl HttpClient for InProcessClient {
    async fn send(&self, request: HttpRequest) -> GraffitiResult<HttpResponse> {
        let mut builder = Request::builder()
            .method(request.method)
            .uri(path_and_query(&request.url));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(actor) = &self.actor {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", encode_component(actor)));
        }
        let http_request = builder
            .body(Body::from(request.body.unwrap_or_default()))
            .map_err(|e| GraffitiError::Transport(e.to_string()))?;

        let response = match self.router.clone().oneshot(http_request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let (parts, body) = response.into_parts();
        Ok(HttpResponse {
            status: parts.status,
            headers: parts.headers,
            body: Box::new(InProcessBody {
                data: Some(body.into_data_stream()),
            }),
        })
    }
}

struct InProcessBody {
    data: Option<BodyDataStream>,
}

#[async_trait]
impl BodyReader for InProcessBody {
    async fn read_chunk(&mut self) -> GraffitiResult<Option<Bytes>> {
        let Some(data) = self.data.as_mut() else {
            return Ok(None);
        };
        match data.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => {
                self.data = None;
                Err(GraffitiError::Transport(e.to_string()))
            }
            None => {
                self.data = None;
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        self.data = None;
    }
}
