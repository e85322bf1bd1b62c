use async_trait::async_trait;
use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode};

use crate::error::GraffitiResult;

/// An outgoing HTTP request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json(mut self, body: &serde_json::Value) -> Self {
        self.headers.insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json; charset=utf-8"),
        );
        self.body = Some(Bytes::from(body.to_string()));
        self
    }
}

/// An HTTP response whose body is read incrementally.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn BodyReader>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Read the remaining body to completion.
    pub async fn bytes(&mut self) -> GraffitiResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.body.read_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Read the remaining body as (lossy) UTF-8 text.
    pub async fn text(&mut self) -> GraffitiResult<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Pull-based access to a response body.
///
/// Each call performs at most one underlying read. `Ok(None)` marks the end
/// of the body.
#[async_trait]
pub trait BodyReader: Send {
    async fn read_chunk(&mut self) -> GraffitiResult<Option<Bytes>>;

    /// Release the underlying connection before the body is exhausted.
    /// Dropping the reader has the same effect.
    fn release(&mut self) {}
}

/// The HTTP-issuing capability carried by remote-capable sessions.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> GraffitiResult<HttpResponse>;
}

/// A body that is already fully in memory, split into fixed chunks.
pub struct ChunkedBody {
    chunks: std::collections::VecDeque<Bytes>,
}

impl ChunkedBody {
    pub fn new(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Split `data` into chunks of at most `chunk_size` bytes.
    pub fn split(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let data: Bytes = data.into();
        let size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(data.len() / size + 1);
        let mut start = 0;
        while start < data.len() {
            let end = (start + size).min(data.len());
            chunks.push(data.slice(start..end));
            start = end;
        }
        Self::new(chunks)
    }
}

#[async_trait]
impl BodyReader for ChunkedBody {
    async fn read_chunk(&mut self) -> GraffitiResult<Option<Bytes>> {
        Ok(self.chunks.pop_front())
    }

    fn release(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunked_body_splits() {
        let mut body = ChunkedBody::split("abcdefg", 3);
        assert_eq!(body.read_chunk().await.unwrap().unwrap(), "abc");
        assert_eq!(body.read_chunk().await.unwrap().unwrap(), "def");
        assert_eq!(body.read_chunk().await.unwrap().unwrap(), "g");
        assert!(body.read_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn response_text() {
        let mut response = HttpResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Box::new(ChunkedBody::split("hello world", 4)),
        };
        assert_eq!(response.text().await.unwrap(), "hello world");
    }

    #[test]
    fn json_request() {
        let req = HttpRequest::new(Method::PUT, "https://x/y").with_json(&serde_json::json!({"a": 1}));
        assert_eq!(req.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert!(req.headers.get(hyper::header::CONTENT_TYPE).is_some());
    }
}
