//! The local/remote merge layer.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use graffiti_store::GraffitiStore;
use graffiti_types::stream::exhausted;
use graffiti_types::{
    ChannelStatsStream, Cursor, CursorKind, GraffitiError, GraffitiObject, GraffitiPatch,
    GraffitiResult, GraffitiStream, ObjectStream, ObjectStreamReturn, PutObject, Session, Step,
    LOCAL_SCHEME, REMOTE_SCHEME,
};

pub const LOCAL_LEG: &str = "local";
pub const REMOTE_LEG: &str = "remote";

/// Which store a url lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Local,
    Remote,
}

/// One store in front of a local store and a remote federation.
///
/// Single-object calls follow the url's scheme. Urlless puts, orphan
/// recovery and channel statistics follow the session: a session carrying
/// an HTTP capability goes remote, anything else stays local. Discovery
/// drains the local store first and then the remote federation.
pub struct RemoteAndLocal {
    local: Arc<dyn GraffitiStore>,
    remote: Arc<dyn GraffitiStore>,
    local_prefix: String,
}

impl RemoteAndLocal {
    pub fn new(local: Arc<dyn GraffitiStore>, remote: Arc<dyn GraffitiStore>) -> Self {
        Self {
            local,
            remote,
            local_prefix: LOCAL_SCHEME.to_string(),
        }
    }

    pub fn with_local_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.local_prefix = prefix.into();
        self
    }

    fn target(&self, url: &str) -> GraffitiResult<Target> {
        if url.starts_with(&self.local_prefix) {
            Ok(Target::Local)
        } else if url.starts_with(REMOTE_SCHEME) {
            Ok(Target::Remote)
        } else {
            Err(GraffitiError::UnrecognizedUrlScheme(format!(
                "unrecognized url scheme: {url}"
            )))
        }
    }

    /// Writes to a remote url need a session that can reach it.
    fn remote_writer(url: &str, session: &Session) -> GraffitiResult<()> {
        if session.is_remote() {
            Ok(())
        } else {
            Err(GraffitiError::Forbidden(format!(
                "{} is remote but the session of {} cannot reach remote origins",
                url,
                session.actor()
            )))
        }
    }

    fn by_session(&self, session: &Session) -> &Arc<dyn GraffitiStore> {
        if session.is_remote() {
            &self.remote
        } else {
            &self.local
        }
    }
}

impl std::fmt::Debug for RemoteAndLocal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAndLocal")
            .field("local_prefix", &self.local_prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GraffitiStore for RemoteAndLocal {
    async fn get(
        &self,
        url: &str,
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<GraffitiObject> {
        match self.target(url)? {
            Target::Local => self.local.get(url, schema, session).await,
            Target::Remote => {
                self.remote
                    .get(url, schema, Session::remote_only(session))
                    .await
            }
        }
    }

    async fn put(&self, object: PutObject, session: &Session) -> GraffitiResult<GraffitiObject> {
        let store = match object.url.as_deref() {
            Some(url) => match self.target(url)? {
                Target::Local => &self.local,
                Target::Remote => {
                    Self::remote_writer(url, session)?;
                    &self.remote
                }
            },
            None => self.by_session(session),
        };
        store.put(object, session).await
    }

    async fn patch(
        &self,
        patch: &GraffitiPatch,
        url: &str,
        session: &Session,
    ) -> GraffitiResult<GraffitiObject> {
        match self.target(url)? {
            Target::Local => self.local.patch(patch, url, session).await,
            Target::Remote => {
                Self::remote_writer(url, session)?;
                self.remote.patch(patch, url, session).await
            }
        }
    }

    async fn delete(&self, url: &str, session: &Session) -> GraffitiResult<GraffitiObject> {
        match self.target(url)? {
            Target::Local => self.local.delete(url, session).await,
            Target::Remote => {
                Self::remote_writer(url, session)?;
                self.remote.delete(url, session).await
            }
        }
    }

    async fn discover(
        &self,
        channels: &[String],
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let local = self.local.discover(channels, schema, session).await?;
        let remote = self.remote.clone();
        let (channels, schema) = (channels.to_vec(), schema.clone());
        let session = Session::remote_only(session).cloned();
        let open_remote =
            async move { remote.discover(&channels, &schema, session.as_ref()).await }.boxed();
        Ok(Box::new(MergedStream::new(
            Leg::Open(local),
            Leg::Pending(open_remote),
        )))
    }

    async fn recover_orphans(
        &self,
        schema: &Value,
        session: &Session,
    ) -> GraffitiResult<ObjectStream> {
        self.by_session(session).recover_orphans(schema, session).await
    }

    async fn channel_stats(&self, session: &Session) -> GraffitiResult<ChannelStatsStream> {
        self.by_session(session).channel_stats(session).await
    }

    async fn continue_object_stream(
        &self,
        cursor: &str,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let composite = match Cursor::parse(cursor)? {
            Some(c) if c.kind == CursorKind::Merge => c,
            Some(_) => {
                return self
                    .remote
                    .continue_object_stream(cursor, Session::remote_only(session))
                    .await
            }
            None => {
                let store = match session {
                    Some(s) if s.is_remote() => &self.remote,
                    _ => &self.local,
                };
                return store.continue_object_stream(cursor, session).await;
            }
        };
        debug!(legs = composite.legs.len(), "resuming merged stream");

        let local = match composite.leg(LOCAL_LEG) {
            Some(leg) => Leg::Open(self.local.continue_object_stream(leg, session).await?),
            None => Leg::Skipped,
        };
        let remote = match composite.leg(REMOTE_LEG) {
            Some(leg) => {
                let remote = self.remote.clone();
                let leg = leg.to_string();
                let session = Session::remote_only(session).cloned();
                Leg::Pending(
                    async move { remote.continue_object_stream(&leg, session.as_ref()).await }
                        .boxed(),
                )
            }
            None => Leg::Skipped,
        };
        Ok(Box::new(MergedStream::new(local, remote)))
    }
}

// ---------------------------------------------------------------------------
// MergedStream
// ---------------------------------------------------------------------------

/// A leg of a merged stream.
pub enum Leg {
    /// Opened on first pull.
    Pending(BoxFuture<'static, GraffitiResult<ObjectStream>>),
    Open(ObjectStream),
    /// Not part of this stream; contributes nothing and no cursor.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergeState {
    LocalActive,
    RemoteActive,
    Done,
}

/// Drains the local leg, then the remote leg, then returns a
/// [`CursorKind::Merge`] cursor wrapping both legs' cursors.
pub struct MergedStream {
    state: MergeState,
    local: Leg,
    remote: Leg,
    cursor: Cursor,
}

impl MergedStream {
    pub fn new(local: Leg, remote: Leg) -> Self {
        Self {
            state: MergeState::LocalActive,
            local,
            remote,
            cursor: Cursor::new(CursorKind::Merge),
        }
    }

    /// Pull the active leg. `None` means the leg is exhausted and its
    /// cursor recorded.
    async fn pull(
        leg: &mut Leg,
        id: &str,
        cursor: &mut Cursor,
    ) -> GraffitiResult<Option<Step<GraffitiObject, ObjectStreamReturn>>> {
        if matches!(leg, Leg::Pending(_)) {
            if let Leg::Pending(open) = std::mem::replace(leg, Leg::Skipped) {
                *leg = Leg::Open(open.await?);
            }
        }
        let Leg::Open(stream) = leg else {
            return Ok(None);
        };
        match stream.next().await? {
            Step::Return(ret) => {
                cursor.set_leg(id, ret.cursor);
                *leg = Leg::Skipped;
                Ok(None)
            }
            step => Ok(Some(step)),
        }
    }

    async fn advance(&mut self) -> GraffitiResult<Step<GraffitiObject, ObjectStreamReturn>> {
        loop {
            match self.state {
                MergeState::LocalActive => {
                    match Self::pull(&mut self.local, LOCAL_LEG, &mut self.cursor).await? {
                        Some(step) => return Ok(step),
                        None => self.state = MergeState::RemoteActive,
                    }
                }
                MergeState::RemoteActive => {
                    match Self::pull(&mut self.remote, REMOTE_LEG, &mut self.cursor).await? {
                        Some(step) => return Ok(step),
                        None => {
                            self.state = MergeState::Done;
                            return Ok(Step::Return(ObjectStreamReturn {
                                cursor: self.cursor.encode(),
                            }));
                        }
                    }
                }
                MergeState::Done => return Err(exhausted()),
            }
        }
    }
}

#[async_trait]
impl GraffitiStream<GraffitiObject, ObjectStreamReturn> for MergedStream {
    async fn next(&mut self) -> GraffitiResult<Step<GraffitiObject, ObjectStreamReturn>> {
        match self.advance().await {
            Ok(step) => Ok(step),
            Err(error) => {
                // Fatal: no cursor is ever returned after this.
                self.close().await;
                Err(error)
            }
        }
    }

    async fn close(&mut self) {
        for leg in [&mut self.local, &mut self.remote] {
            if let Leg::Open(stream) = leg {
                stream.close().await;
            }
            *leg = Leg::Skipped;
        }
        self.state = MergeState::Done;
    }
}
