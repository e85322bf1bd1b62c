use std::sync::Arc;

use async_trait::async_trait;
use hyper::Method;
use json_patch::PatchOperation;
use serde_json::Value;
use tracing::debug;

use graffiti_protocol::envelope::{
    parse_channel_stats_entry, parse_cursor_return, parse_empty_return,
};
use graffiti_protocol::{
    encode_query_params, endpoints, normalize_origin, open_lines, read_object, url_to_http_url,
    QueryParams,
};
use graffiti_store::{check_schema, GraffitiStore, SchemaCache};
use graffiti_types::{
    actor_of, ChannelStatsStream, GraffitiError, GraffitiObject, GraffitiPatch, GraffitiResult,
    HttpClient, HttpRequest, ObjectStream, ObjectStreamReturn, PutObject, Session,
};

use crate::pipeline::{Desired, EntryPipeline};
use crate::stream::LiveObjects;

/// Client for a single Graffiti origin.
///
/// Every request goes to the origin this client was built for. Reads made
/// without a remote-capable session use the client's own anonymous HTTP
/// capability; writes require one.
pub struct RemoteStore {
    origin: String,
    http_origin: String,
    http: Arc<dyn HttpClient>,
    schemas: SchemaCache,
}

impl RemoteStore {
    /// `origin` is a `remote:` token such as `remote:pod.example`; it is
    /// normalized before use.
    pub fn new(origin: &str, http: Arc<dyn HttpClient>) -> GraffitiResult<Self> {
        let origin = normalize_origin(origin)?;
        let http_origin = url_to_http_url(&origin)?;
        Ok(Self {
            origin,
            http_origin,
            http,
            schemas: SchemaCache::new(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn http_origin(&self) -> &str {
        &self.http_origin
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.http_origin)
    }

    fn client<'a>(&'a self, session: Option<&'a Session>) -> &'a Arc<dyn HttpClient> {
        session.and_then(Session::http).unwrap_or(&self.http)
    }

    fn authorized(session: &Session) -> GraffitiResult<&Arc<dyn HttpClient>> {
        session.http().ok_or_else(|| {
            GraffitiError::Unauthorized(format!(
                "{} has no session capable of reaching a remote origin",
                session.actor()
            ))
        })
    }

    async fn open_objects(
        &self,
        http: &Arc<dyn HttpClient>,
        url: String,
        pipeline: EntryPipeline,
    ) -> GraffitiResult<ObjectStream> {
        debug!(origin = %self.origin, %url, "opening object stream");
        let response = http.send(HttpRequest::get(url)).await?;
        let decoder = open_lines::<GraffitiObject, ObjectStreamReturn>(
            response,
            &self.origin,
            Box::new(move |line| pipeline.process(line)),
            Box::new(parse_cursor_return),
        )
        .await?;
        Ok(Box::new(decoder))
    }
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("origin", &self.origin)
            .field("http_origin", &self.http_origin)
            .finish_non_exhaustive()
    }
}

/// Each operation as its own JSON string, so channel and allowed patches
/// travel as independent query parameter entries.
fn operation_strings(operations: &[PatchOperation]) -> GraffitiResult<Vec<String>> {
    operations
        .iter()
        .map(|op| serde_json::to_string(op).map_err(|e| GraffitiError::PatchError(e.to_string())))
        .collect()
}

#[async_trait]
impl GraffitiStore for RemoteStore {
    async fn get(
        &self,
        url: &str,
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<GraffitiObject> {
        let validator = self.schemas.compile(schema)?;
        let request_url = encode_query_params(
            &url_to_http_url(url)?,
            &QueryParams {
                schema: Some(schema),
                ..Default::default()
            },
        );
        let response = self.client(session).send(HttpRequest::get(request_url)).await?;
        let object = read_object(response, Some(url)).await?;
        if object.tombstone {
            return Err(GraffitiError::NotFound(format!("{url} has been deleted")));
        }
        check_schema(&validator, &object)?;
        Ok(object)
    }

    async fn put(&self, object: PutObject, session: &Session) -> GraffitiResult<GraffitiObject> {
        if object.actor.as_deref().is_some_and(|a| a != session.actor()) {
            return Err(GraffitiError::Forbidden(
                "cannot put an object as another actor".into(),
            ));
        }
        let http = Self::authorized(session)?;
        let query = QueryParams {
            channels: Some(&object.channels),
            allowed: object.allowed.as_deref(),
            ..Default::default()
        };
        let (request, known_url) = match object.url.as_deref() {
            Some(url) => (
                HttpRequest::new(Method::PUT, encode_query_params(&url_to_http_url(url)?, &query)),
                Some(url),
            ),
            None => (
                HttpRequest::new(
                    Method::POST,
                    encode_query_params(&self.endpoint(endpoints::CREATE), &query),
                ),
                None,
            ),
        };
        let response = http.send(request.with_json(&object.value)).await?;
        read_object(response, known_url).await
    }

    async fn patch(
        &self,
        patch: &GraffitiPatch,
        url: &str,
        session: &Session,
    ) -> GraffitiResult<GraffitiObject> {
        let http = Self::authorized(session)?;
        let channels = patch.channels.as_deref().map(operation_strings).transpose()?;
        let allowed = patch.allowed.as_deref().map(operation_strings).transpose()?;
        let query = QueryParams {
            channels: channels.as_deref(),
            allowed: allowed.as_deref(),
            ..Default::default()
        };
        let mut request =
            HttpRequest::new(Method::PATCH, encode_query_params(&url_to_http_url(url)?, &query));
        if let Some(operations) = &patch.value {
            let body = serde_json::to_value(operations)
                .map_err(|e| GraffitiError::PatchError(e.to_string()))?;
            request = request.with_json(&body);
        }
        read_object(http.send(request).await?, Some(url)).await
    }

    async fn delete(&self, url: &str, session: &Session) -> GraffitiResult<GraffitiObject> {
        let http = Self::authorized(session)?;
        let request = HttpRequest::new(Method::DELETE, url_to_http_url(url)?);
        read_object(http.send(request).await?, Some(url)).await
    }

    async fn discover(
        &self,
        channels: &[String],
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let validator = self.schemas.compile(schema)?;
        let url = encode_query_params(
            &self.endpoint(endpoints::DISCOVER),
            &QueryParams {
                channels: Some(channels),
                schema: Some(schema),
                ..Default::default()
            },
        );
        let pipeline = EntryPipeline::standard(
            &self.origin,
            actor_of(session),
            Some(Desired::InChannels(channels.to_vec())),
            Some(validator),
        );
        let stream = self.open_objects(self.client(session), url, pipeline).await?;
        Ok(Box::new(LiveObjects::new(stream)))
    }

    async fn recover_orphans(
        &self,
        schema: &Value,
        session: &Session,
    ) -> GraffitiResult<ObjectStream> {
        let http = Self::authorized(session)?;
        let validator = self.schemas.compile(schema)?;
        let url = encode_query_params(
            &self.endpoint(endpoints::RECOVER_ORPHANS),
            &QueryParams {
                schema: Some(schema),
                ..Default::default()
            },
        );
        let pipeline = EntryPipeline::standard(
            &self.origin,
            Some(session.actor()),
            Some(Desired::OrphanOf(session.actor().to_string())),
            Some(validator),
        );
        let stream = self.open_objects(http, url, pipeline).await?;
        Ok(Box::new(LiveObjects::new(stream)))
    }

    async fn channel_stats(&self, session: &Session) -> GraffitiResult<ChannelStatsStream> {
        let http = Self::authorized(session)?;
        let response = http
            .send(HttpRequest::get(self.endpoint(endpoints::CHANNEL_STATS)))
            .await?;
        let decoder = open_lines(
            response,
            &self.origin,
            Box::new(parse_channel_stats_entry),
            Box::new(parse_empty_return),
        )
        .await?;
        Ok(Box::new(decoder))
    }

    async fn continue_object_stream(
        &self,
        cursor: &str,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let url = encode_query_params(
            &self.endpoint(endpoints::CONTINUE),
            &QueryParams {
                cursor: Some(cursor),
                ..Default::default()
            },
        );
        let pipeline = EntryPipeline::standard(&self.origin, actor_of(session), None, None);
        self.open_objects(self.client(session), url, pipeline).await
    }
}
