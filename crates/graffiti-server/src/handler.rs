//! Route handlers for the origin wire protocol.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use json_patch::PatchOperation;
use serde_json::Value;
use tracing::{debug, warn};

use graffiti_protocol::envelope::{channel_stats_entry, cursor_return, object_entry};
use graffiti_protocol::{
    encode_component, encode_last_modified, encode_string_list, headers, JSON_CONTENT_TYPE,
    STREAM_CONTENT_TYPE,
};
use graffiti_store::{GraffitiStore, MemoryStore};
use graffiti_types::{
    GraffitiError, GraffitiObject, GraffitiPatch, GraffitiStream, ObjectStreamReturn, PutObject,
    Step, StreamEntry,
};

use crate::auth::Credentials;
use crate::error::{ServerError, ServerResult};
use crate::query::{patch_operations, RequestQuery};

/// Shared state behind every route.
#[derive(Clone, Debug)]
pub struct AppState {
    store: Arc<MemoryStore>,
    origin: String,
}

impl AppState {
    pub fn new(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        Self {
            store: Arc::new(MemoryStore::for_origin(&origin)),
            origin,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{name}", self.origin)
    }
}

// ---------------------------------------------------------------------------
// Single objects
// ---------------------------------------------------------------------------

pub async fn get_object(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> ServerResult<Response> {
    let credentials = Credentials::from_headers(&request_headers)?;
    let query = RequestQuery::parse(raw.as_deref())?;
    let url = state.url_for(&name);
    debug!(%url, "get");
    let object = state
        .store
        .get(&url, &query.schema(), credentials.session().as_ref())
        .await?;
    object_response(snapshot_status(&object), &object, false)
}

pub async fn put_object(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> ServerResult<Response> {
    let session = Credentials::from_headers(&request_headers)?.require()?;
    let query = RequestQuery::parse(raw.as_deref())?;
    let url = state.url_for(&name);
    debug!(%url, actor = session.actor(), "put");
    let object = PutObject {
        url: Some(url),
        actor: None,
        value: json_body(&body)?,
        channels: query.channels.unwrap_or_default(),
        allowed: query.allowed,
    };
    let previous = state.store.put(object, &session).await?;
    object_response(snapshot_status(&previous), &previous, false)
}

pub async fn create_object(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> ServerResult<Response> {
    let session = Credentials::from_headers(&request_headers)?.require()?;
    let query = RequestQuery::parse(raw.as_deref())?;
    let object = PutObject {
        url: None,
        actor: None,
        value: json_body(&body)?,
        channels: query.channels.unwrap_or_default(),
        allowed: query.allowed,
    };
    let created = state.store.put(object, &session).await?;
    debug!(url = %created.url, actor = session.actor(), "created");
    object_response(StatusCode::CREATED, &created, true)
}

pub async fn patch_object(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> ServerResult<Response> {
    let session = Credentials::from_headers(&request_headers)?.require()?;
    let query = RequestQuery::parse(raw.as_deref())?;
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let operations: Value = serde_json::from_slice(&body)
            .map_err(|e| GraffitiError::PatchError(format!("body is not valid JSON: {e}")))?;
        if !operations.is_array() {
            return Err(GraffitiError::PatchError("value patch must be an array".into()).into());
        }
        let operations: Vec<PatchOperation> = serde_json::from_value(operations)
            .map_err(|e| GraffitiError::PatchError(format!("invalid value patch: {e}")))?;
        Some(operations)
    };
    let patch = GraffitiPatch {
        value,
        channels: query
            .channels
            .as_deref()
            .map(|ops| patch_operations(ops, "channels"))
            .transpose()?,
        allowed: query
            .allowed
            .as_deref()
            .map(|ops| patch_operations(ops, "allowed"))
            .transpose()?,
    };
    let url = state.url_for(&name);
    debug!(%url, actor = session.actor(), "patch");
    let previous = state.store.patch(&patch, &url, &session).await?;
    object_response(snapshot_status(&previous), &previous, false)
}

pub async fn delete_object(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request_headers: HeaderMap,
) -> ServerResult<Response> {
    let session = Credentials::from_headers(&request_headers)?.require()?;
    let url = state.url_for(&name);
    debug!(%url, actor = session.actor(), "delete");
    let deleted = state.store.delete(&url, &session).await?;
    object_response(snapshot_status(&deleted), &deleted, false)
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

pub async fn discover(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> ServerResult<Response> {
    let credentials = Credentials::from_headers(&request_headers)?;
    let query = RequestQuery::parse(raw.as_deref())?;
    let channels = query.channels.clone().unwrap_or_default();
    debug!(?channels, "discover");
    let stream = state
        .store
        .discover(&channels, &query.schema(), credentials.session().as_ref())
        .await?;
    stream_response(object_lines(stream))
}

pub async fn recover_orphans(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> ServerResult<Response> {
    let session = Credentials::from_headers(&request_headers)?.require()?;
    let query = RequestQuery::parse(raw.as_deref())?;
    debug!(actor = session.actor(), "recover orphans");
    let stream = state.store.recover_orphans(&query.schema(), &session).await?;
    stream_response(object_lines(stream))
}

pub async fn continue_stream(
    State(state): State<AppState>,
    request_headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> ServerResult<Response> {
    let credentials = Credentials::from_headers(&request_headers)?;
    let query = RequestQuery::parse(raw.as_deref())?;
    let cursor = query
        .cursor
        .ok_or_else(|| ServerError::BadRequest("cursor is required".into()))?;
    let stream = state
        .store
        .continue_object_stream(&cursor, credentials.session().as_ref())
        .await?;
    stream_response(object_lines(stream))
}

pub async fn channel_stats(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> ServerResult<Response> {
    let session = Credentials::from_headers(&request_headers)?.require()?;
    let stream = state.store.channel_stats(&session).await?;
    stream_response(json_lines(stream, channel_stats_entry, |_: &()| None))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// 410 marks a snapshot that is a tombstone.
fn snapshot_status(object: &GraffitiObject) -> StatusCode {
    if object.tombstone {
        StatusCode::GONE
    } else {
        StatusCode::OK
    }
}

fn json_body(body: &[u8]) -> ServerResult<Value> {
    serde_json::from_slice(body).map_err(|e| {
        GraffitiError::InvalidSchema(format!("body is not valid JSON: {e}")).into()
    })
}

fn header_value(value: &str) -> ServerResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ServerError::Internal(e.to_string()))
}

fn object_response(
    status: StatusCode,
    object: &GraffitiObject,
    with_location: bool,
) -> ServerResult<Response> {
    let (date, millis) = encode_last_modified(object.last_modified);
    let mut response = Response::new(Body::from(object.value.to_string()));
    *response.status_mut() = status;
    let out = response.headers_mut();
    out.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    out.insert(HeaderName::from_static(headers::LAST_MODIFIED), header_value(&date)?);
    out.insert(HeaderName::from_static(headers::LAST_MODIFIED_MS), header_value(&millis)?);
    out.insert(
        HeaderName::from_static(headers::ACTOR),
        header_value(&encode_component(&object.actor))?,
    );
    if !object.channels.is_empty() {
        out.insert(
            HeaderName::from_static(headers::CHANNELS),
            header_value(&encode_string_list(&object.channels))?,
        );
    }
    if let Some(allowed) = &object.allowed {
        out.insert(
            HeaderName::from_static(headers::ALLOWED),
            header_value(&encode_string_list(allowed))?,
        );
    }
    if with_location {
        out.insert(
            HeaderName::from_static(headers::LOCATION),
            header_value(&encode_component(&object.url))?,
        );
    }
    Ok(response)
}

fn stream_response(body: Body) -> ServerResult<Response> {
    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(STREAM_CONTENT_TYPE));
    Ok(response)
}

fn object_lines(stream: Box<dyn GraffitiStream<GraffitiObject, ObjectStreamReturn>>) -> Body {
    json_lines(stream, object_entry, |ret: &ObjectStreamReturn| {
        Some(cursor_return(ret))
    })
}

/// Render a stream as one JSON line per element followed by the terminal
/// line. Error entries are logged and left out; a fatal error cuts the body
/// short so the client never sees a terminal value.
fn json_lines<T, R>(
    stream: Box<dyn GraffitiStream<T, R>>,
    to_entry: fn(&T) -> Value,
    to_terminal: fn(&R) -> Option<Value>,
) -> Body
where
    T: Send + 'static,
    R: Send + 'static,
{
    let lines = futures::stream::unfold(Some(stream), move |state| async move {
        let mut stream = state?;
        loop {
            match stream.next().await {
                Ok(Step::Yield(StreamEntry::Element(element))) => {
                    return Some((Ok(line(Some(to_entry(&element)))), Some(stream)));
                }
                Ok(Step::Yield(StreamEntry::Error { error, origin })) => {
                    warn!(%origin, %error, "skipping stream entry");
                }
                Ok(Step::Return(terminal)) => {
                    return Some((Ok(line(to_terminal(&terminal))), None));
                }
                Err(error) => {
                    warn!(%error, "stream failed");
                    return Some((Err(ServerError::from(error)), None));
                }
            }
        }
    });
    Body::from_stream(lines)
}

fn line(value: Option<Value>) -> Bytes {
    let mut text = value.map(|v| v.to_string()).unwrap_or_default();
    text.push('\n');
    Bytes::from(text)
}
