//! The multi-origin router.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use graffiti_protocol::{normalize_origin, origin_of};
use graffiti_remote::RemoteStore;
use graffiti_store::GraffitiStore;
use graffiti_types::{
    ChannelStats, ChannelStatsStream, Cursor, CursorKind, GraffitiError, GraffitiObject,
    GraffitiPatch, GraffitiResult, GraffitiStream, HttpClient, ObjectStream, ObjectStreamReturn,
    PutObject, Session,
};

use crate::config::FederationConfig;
use crate::stream::{LegOpener, MapReturn, Outcomes, PendingLeg, Sequential};

/// Routes each call to the [`RemoteStore`] of the origin it addresses.
///
/// Clients are created on first use and never evicted. Federation-wide
/// streams visit the registered origins one at a time, in registration
/// order, and resume from a [`CursorKind::Federation`] cursor.
pub struct RemoteRouter {
    /// Registration order of the configured origins.
    registered: Vec<String>,
    stores: RwLock<BTreeMap<String, Arc<RemoteStore>>>,
    default_origin: String,
    http: Arc<dyn HttpClient>,
}

impl RemoteRouter {
    /// `http` serves reads made without a remote-capable session.
    pub fn new(config: &FederationConfig, http: Arc<dyn HttpClient>) -> GraffitiResult<Self> {
        let default_origin = normalize_origin(&config.default_origin)?;
        let mut router = Self {
            registered: Vec::new(),
            stores: RwLock::new(BTreeMap::new()),
            default_origin,
            http,
        };
        for origin in config.origins() {
            let origin = normalize_origin(&origin)?;
            router.store_for(&origin)?;
            if !router.registered.contains(&origin) {
                router.registered.push(origin);
            }
        }
        Ok(router)
    }

    pub fn default_origin(&self) -> &str {
        &self.default_origin
    }

    /// Configured origins, in the order federation-wide streams visit them.
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Every origin a client exists for.
    pub fn known_origins(&self) -> Vec<String> {
        self.stores.read().expect("lock poisoned").keys().cloned().collect()
    }

    /// The client for the origin `url` belongs to.
    pub fn which_store(&self, url: &str) -> GraffitiResult<Arc<RemoteStore>> {
        self.store_for(&origin_of(url)?)
    }

    fn store_for(&self, origin: &str) -> GraffitiResult<Arc<RemoteStore>> {
        if let Some(store) = self.stores.read().expect("lock poisoned").get(origin) {
            return Ok(store.clone());
        }
        let store = Arc::new(RemoteStore::new(origin, self.http.clone())?);
        debug!(%origin, "registered origin");
        let mut stores = self.stores.write().expect("lock poisoned");
        Ok(stores.entry(origin.to_string()).or_insert(store).clone())
    }

    fn registered_legs(&self) -> GraffitiResult<Vec<PendingLeg>> {
        self.registered
            .iter()
            .map(|origin| {
                Ok(PendingLeg {
                    origin: origin.clone(),
                    store: self.store_for(origin)?,
                    cursor: None,
                })
            })
            .collect()
    }

    fn federated_objects(
        legs: Vec<PendingLeg>,
        open: LegOpener<GraffitiObject, ObjectStreamReturn>,
    ) -> ObjectStream {
        let previous: Vec<(String, String)> = legs
            .iter()
            .filter_map(|leg| Some((leg.origin.clone(), leg.cursor.clone()?)))
            .collect();
        let drained: Box<dyn GraffitiStream<GraffitiObject, Outcomes<ObjectStreamReturn>>> =
            Box::new(Sequential::new(legs, open));
        Box::new(MapReturn::new(drained, move |outcomes| {
            Ok(ObjectStreamReturn {
                cursor: federation_cursor(outcomes, &previous).encode(),
            })
        }))
    }
}

/// Every origin that finished contributes its new cursor; one that failed
/// keeps the cursor it was resumed from, if any.
fn federation_cursor(
    outcomes: Outcomes<ObjectStreamReturn>,
    previous: &[(String, String)],
) -> Cursor {
    let mut cursor = Cursor::new(CursorKind::Federation);
    for (origin, outcome) in outcomes {
        match outcome {
            Some(ret) => cursor.set_leg(origin, ret.cursor),
            None => {
                if let Some((_, old)) = previous.iter().find(|(o, _)| *o == origin) {
                    cursor.set_leg(origin, old.clone());
                }
            }
        }
    }
    cursor
}

impl std::fmt::Debug for RemoteRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRouter")
            .field("registered", &self.registered)
            .field("default_origin", &self.default_origin)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GraffitiStore for RemoteRouter {
    async fn get(
        &self,
        url: &str,
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<GraffitiObject> {
        self.which_store(url)?.get(url, schema, session).await
    }

    async fn put(&self, object: PutObject, session: &Session) -> GraffitiResult<GraffitiObject> {
        let store = match object.url.as_deref() {
            Some(url) => self.which_store(url)?,
            None => self.store_for(&self.default_origin)?,
        };
        store.put(object, session).await
    }

    async fn patch(
        &self,
        patch: &GraffitiPatch,
        url: &str,
        session: &Session,
    ) -> GraffitiResult<GraffitiObject> {
        self.which_store(url)?.patch(patch, url, session).await
    }

    async fn delete(&self, url: &str, session: &Session) -> GraffitiResult<GraffitiObject> {
        self.which_store(url)?.delete(url, session).await
    }

    async fn discover(
        &self,
        channels: &[String],
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let channels = channels.to_vec();
        let schema = schema.clone();
        let session = session.cloned();
        let open: LegOpener<GraffitiObject, ObjectStreamReturn> =
            Box::new(move |store: Arc<RemoteStore>, _: Option<String>| {
                let (channels, schema, session) = (channels.clone(), schema.clone(), session.clone());
                async move { store.discover(&channels, &schema, session.as_ref()).await }.boxed()
            });
        Ok(Self::federated_objects(self.registered_legs()?, open))
    }

    async fn recover_orphans(
        &self,
        schema: &Value,
        session: &Session,
    ) -> GraffitiResult<ObjectStream> {
        let schema = schema.clone();
        let session = session.clone();
        let open: LegOpener<GraffitiObject, ObjectStreamReturn> =
            Box::new(move |store: Arc<RemoteStore>, _: Option<String>| {
                let (schema, session) = (schema.clone(), session.clone());
                async move { store.recover_orphans(&schema, &session).await }.boxed()
            });
        Ok(Self::federated_objects(self.registered_legs()?, open))
    }

    async fn channel_stats(&self, session: &Session) -> GraffitiResult<ChannelStatsStream> {
        let session = session.clone();
        let open: LegOpener<ChannelStats, ()> =
            Box::new(move |store: Arc<RemoteStore>, _: Option<String>| {
                let session = session.clone();
                async move { store.channel_stats(&session).await }.boxed()
            });
        let drained: Box<dyn GraffitiStream<ChannelStats, Outcomes<()>>> =
            Box::new(Sequential::new(self.registered_legs()?, open));
        Ok(Box::new(MapReturn::new(drained, |_| Ok(()))))
    }

    async fn continue_object_stream(
        &self,
        cursor: &str,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let Some(composite) = Cursor::parse(cursor)? else {
            debug!(origin = %self.default_origin, "resuming a leaf cursor on the default origin");
            return self
                .store_for(&self.default_origin)?
                .continue_object_stream(cursor, session)
                .await;
        };
        if composite.kind != CursorKind::Federation {
            return Err(GraffitiError::NotFound(
                "cursor was not minted by a federation".into(),
            ));
        }
        let legs = composite
            .legs
            .into_iter()
            .map(|leg| {
                let origin = normalize_origin(&leg.id)?;
                Ok(PendingLeg {
                    store: self.store_for(&origin)?,
                    origin,
                    cursor: Some(leg.cursor),
                })
            })
            .collect::<GraffitiResult<Vec<_>>>()?;
        let session = session.cloned();
        let open: LegOpener<GraffitiObject, ObjectStreamReturn> =
            Box::new(move |store: Arc<RemoteStore>, cursor: Option<String>| {
                let session = session.clone();
                async move {
                    let cursor = cursor.unwrap_or_default();
                    store.continue_object_stream(&cursor, session.as_ref()).await
                }
                .boxed()
            });
        Ok(Self::federated_objects(legs, open))
    }
}
