use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use json_patch::{PatchErrorKind, PatchOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use graffiti_types::{
    ChannelStats, ChannelStatsStream, GraffitiError, GraffitiObject, GraffitiPatch,
    GraffitiResult, ObjectStream, ObjectStreamReturn, PutObject, Session, StreamEntry, VecStream,
    LOCAL_SCHEME,
};

use crate::access::mask_object;
use crate::schema::{check_schema, SchemaCache};
use crate::traits::GraffitiStore;

/// `HashMap`-based store holding every object in memory.
///
/// Serves `local:` urls for the merge layer, and backs the reference origin
/// server with urls minted under the server's origin. Deleted objects are
/// kept as tombstones so that continued streams can report the deletion.
pub struct MemoryStore {
    prefix: String,
    state: RwLock<State>,
    schemas: SchemaCache,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, GraffitiObject>,
    /// Last `last_modified` handed out; every write gets a larger one.
    clock: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.clock = now.max(self.clock + 1);
        self.clock
    }

    fn live(&self, url: &str) -> GraffitiResult<&GraffitiObject> {
        self.objects
            .get(url)
            .filter(|o| !o.tombstone)
            .ok_or_else(|| GraffitiError::NotFound(format!("no object at {url}")))
    }
}

/// Leaf cursor minted by [`MemoryStore`]: the query to re-run and the clock
/// value it has already covered.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "kebab-case")]
enum MemoryCursor {
    Discover {
        channels: Vec<String>,
        schema: Value,
        since: u64,
    },
    RecoverOrphans {
        actor: String,
        schema: Value,
        since: u64,
    },
}

impl MemoryCursor {
    fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl MemoryStore {
    /// A store for `local:` urls.
    pub fn new() -> Self {
        Self::with_prefix(LOCAL_SCHEME)
    }

    /// A store whose urls all start with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state: RwLock::new(State::default()),
            schemas: SchemaCache::new(),
        }
    }

    /// A store serving the objects of `origin`; urls are `<origin>/<name>`.
    pub fn for_origin(origin: &str) -> Self {
        Self::with_prefix(format!("{}/", origin.trim_end_matches('/')))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of live (non-deleted) objects.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .expect("lock poisoned")
            .objects
            .values()
            .filter(|o| !o.tombstone)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn owns(&self, url: &str) -> GraffitiResult<()> {
        if url.starts_with(&self.prefix) {
            Ok(())
        } else {
            Err(GraffitiError::NotFound(format!(
                "{url} does not belong to this store"
            )))
        }
    }

    fn mint_url(&self) -> String {
        format!("{}{}", self.prefix, Uuid::now_v7().simple())
    }

    /// Run a query over the snapshot, returning matching objects in
    /// modification order along with the clock value the snapshot covers.
    fn select(
        &self,
        since: Option<u64>,
        mut desired: impl FnMut(&GraffitiObject) -> bool,
    ) -> (Vec<GraffitiObject>, u64) {
        let state = self.state.read().expect("lock poisoned");
        let mut selected: Vec<GraffitiObject> = state
            .objects
            .values()
            .filter(|o| match since {
                None => !o.tombstone,
                Some(since) => o.last_modified > since,
            })
            .filter(|o| desired(o))
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.url.cmp(&b.url))
        });
        (selected, state.clock)
    }

    fn object_stream(
        &self,
        query: &MemoryQuery<'_>,
        since: Option<u64>,
        requester: Option<&str>,
    ) -> GraffitiResult<ObjectStream> {
        let validator = self.schemas.compile(query.schema())?;
        let (objects, clock) = self.select(since, |o| {
            o.is_visible_to(requester) && query.desires(o)
        });

        let mut entries = Vec::with_capacity(objects.len());
        for object in objects {
            if object.tombstone {
                entries.push(StreamEntry::Element(GraffitiObject::tombstone(
                    object.url,
                    object.last_modified,
                )));
                continue;
            }
            let masked = mask_object(&object, requester, query.channels());
            match check_schema(&validator, &masked) {
                Ok(()) => entries.push(StreamEntry::Element(masked)),
                Err(_) => debug!(url = %masked.url, "skipping object that does not match schema"),
            }
        }

        let cursor = query.cursor(clock).encode();
        debug!(entries = entries.len(), "memory stream opened");
        Ok(Box::new(VecStream::new(
            entries,
            ObjectStreamReturn { cursor },
        )))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("prefix", &self.prefix)
            .field("object_count", &self.len())
            .finish()
    }
}

enum MemoryQuery<'a> {
    Discover {
        channels: &'a [String],
        schema: &'a Value,
    },
    RecoverOrphans {
        actor: &'a str,
        schema: &'a Value,
    },
}

impl MemoryQuery<'_> {
    fn schema(&self) -> &Value {
        match self {
            Self::Discover { schema, .. } | Self::RecoverOrphans { schema, .. } => schema,
        }
    }

    fn channels(&self) -> &[String] {
        match self {
            Self::Discover { channels, .. } => channels,
            Self::RecoverOrphans { .. } => &[],
        }
    }

    fn desires(&self, object: &GraffitiObject) -> bool {
        match self {
            Self::Discover { channels, .. } => object.in_any_channel(channels),
            Self::RecoverOrphans { actor, .. } => {
                object.actor == *actor && object.channels.is_empty()
            }
        }
    }

    fn cursor(&self, since: u64) -> MemoryCursor {
        match self {
            Self::Discover { channels, schema } => MemoryCursor::Discover {
                channels: channels.to_vec(),
                schema: (*schema).clone(),
                since,
            },
            Self::RecoverOrphans { actor, schema } => MemoryCursor::RecoverOrphans {
                actor: actor.to_string(),
                schema: (*schema).clone(),
                since,
            },
        }
    }
}

fn apply_patch(doc: &mut Value, operations: &[PatchOperation], field: &str) -> GraffitiResult<()> {
    json_patch::patch(doc, operations).map_err(|e| match &e.kind {
        PatchErrorKind::TestFailed => GraffitiError::PatchTestFailed(format!("{field}: {e}")),
        _ => GraffitiError::PatchError(format!("{field}: {e}")),
    })
}

fn string_list(doc: Value, field: &str) -> GraffitiResult<Vec<String>> {
    serde_json::from_value(doc).map_err(|_| {
        GraffitiError::PatchError(format!("{field} must remain a list of strings"))
    })
}

fn patched(object: &GraffitiObject, patch: &GraffitiPatch) -> GraffitiResult<GraffitiObject> {
    let mut next = object.clone();
    if let Some(operations) = &patch.value {
        apply_patch(&mut next.value, operations, "value")?;
        if !next.value.is_object() {
            return Err(GraffitiError::PatchError(
                "value must remain a JSON object".into(),
            ));
        }
    }
    if let Some(operations) = &patch.channels {
        let mut doc = serde_json::to_value(&next.channels).unwrap_or_default();
        apply_patch(&mut doc, operations, "channels")?;
        next.channels = string_list(doc, "channels")?;
    }
    if let Some(operations) = &patch.allowed {
        let mut doc = serde_json::to_value(&next.allowed).unwrap_or_default();
        apply_patch(&mut doc, operations, "allowed")?;
        next.allowed = match doc {
            Value::Null => None,
            doc => Some(string_list(doc, "allowed")?),
        };
    }
    Ok(next)
}

#[async_trait]
impl GraffitiStore for MemoryStore {
    async fn get(
        &self,
        url: &str,
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<GraffitiObject> {
        let validator = self.schemas.compile(schema)?;
        let requester = session.map(Session::actor);
        let object = {
            let state = self.state.read().expect("lock poisoned");
            let object = state.live(url)?;
            if !object.is_visible_to(requester) {
                return Err(GraffitiError::NotFound(format!("no object at {url}")));
            }
            mask_object(object, requester, &[])
        };
        check_schema(&validator, &object)?;
        Ok(object)
    }

    async fn put(&self, object: PutObject, session: &Session) -> GraffitiResult<GraffitiObject> {
        let actor = session.actor();
        if object.actor.as_deref().is_some_and(|a| a != actor) {
            return Err(GraffitiError::Forbidden(
                "cannot put an object as another actor".into(),
            ));
        }
        if !object.value.is_object() {
            return Err(GraffitiError::InvalidSchema(
                "value must be a JSON object".into(),
            ));
        }
        let url = match object.url {
            Some(url) => {
                self.owns(&url)?;
                url
            }
            None => self.mint_url(),
        };

        let mut state = self.state.write().expect("lock poisoned");
        let previous = state.objects.get(&url).cloned();
        if let Some(previous) = &previous {
            if !previous.tombstone && previous.actor != actor {
                return Err(GraffitiError::Forbidden(format!(
                    "{url} belongs to another actor"
                )));
            }
        }
        let last_modified = state.tick();
        let written = GraffitiObject {
            url: url.clone(),
            actor: actor.to_string(),
            value: object.value,
            channels: object.channels,
            allowed: object.allowed,
            last_modified,
            tombstone: false,
        };
        state.objects.insert(url.clone(), written);
        debug!(%url, last_modified, "object written");

        Ok(match previous {
            Some(previous) if !previous.tombstone => previous,
            _ => GraffitiObject {
                actor: actor.to_string(),
                ..GraffitiObject::tombstone(url, last_modified)
            },
        })
    }

    async fn patch(
        &self,
        patch: &GraffitiPatch,
        url: &str,
        session: &Session,
    ) -> GraffitiResult<GraffitiObject> {
        let mut state = self.state.write().expect("lock poisoned");
        let current = state.live(url)?.clone();
        if current.actor != session.actor() {
            return Err(GraffitiError::Forbidden(format!(
                "{url} belongs to another actor"
            )));
        }
        let mut next = patched(&current, patch)?;
        next.last_modified = state.tick();
        debug!(%url, last_modified = next.last_modified, "object patched");
        state.objects.insert(url.to_string(), next);
        Ok(current)
    }

    async fn delete(&self, url: &str, session: &Session) -> GraffitiResult<GraffitiObject> {
        let mut state = self.state.write().expect("lock poisoned");
        let current = state.live(url)?;
        if current.actor != session.actor() {
            return Err(GraffitiError::Forbidden(format!(
                "{url} belongs to another actor"
            )));
        }
        let mut deleted = current.clone();
        deleted.tombstone = true;
        deleted.last_modified = state.tick();
        state.objects.insert(url.to_string(), deleted.clone());
        debug!(%url, "object deleted");
        Ok(deleted)
    }

    async fn discover(
        &self,
        channels: &[String],
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        self.object_stream(
            &MemoryQuery::Discover { channels, schema },
            None,
            session.map(Session::actor),
        )
    }

    async fn recover_orphans(
        &self,
        schema: &Value,
        session: &Session,
    ) -> GraffitiResult<ObjectStream> {
        let actor = session.actor();
        self.object_stream(
            &MemoryQuery::RecoverOrphans { actor, schema },
            None,
            Some(actor),
        )
    }

    async fn channel_stats(&self, session: &Session) -> GraffitiResult<ChannelStatsStream> {
        let actor = session.actor();
        let mut stats: BTreeMap<String, ChannelStats> = BTreeMap::new();
        let state = self.state.read().expect("lock poisoned");
        for object in state
            .objects
            .values()
            .filter(|o| !o.tombstone && o.actor == actor)
        {
            for channel in &object.channels {
                let entry = stats.entry(channel.clone()).or_insert_with(|| ChannelStats {
                    channel: channel.clone(),
                    count: 0,
                    last_modified: 0,
                });
                entry.count += 1;
                entry.last_modified = entry.last_modified.max(object.last_modified);
            }
        }
        Ok(Box::new(VecStream::of_elements(stats.into_values(), ())))
    }

    async fn continue_object_stream(
        &self,
        cursor: &str,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream> {
        let parsed: MemoryCursor = serde_json::from_str(cursor)
            .map_err(|_| GraffitiError::NotFound("cursor not found".into()))?;
        let requester = session.map(Session::actor);
        match &parsed {
            MemoryCursor::Discover {
                channels,
                schema,
                since,
            } => self.object_stream(
                &MemoryQuery::Discover { channels, schema },
                Some(*since),
                requester,
            ),
            MemoryCursor::RecoverOrphans {
                actor,
                schema,
                since,
            } => {
                if requester != Some(actor.as_str()) {
                    return Err(GraffitiError::Forbidden(
                        "cursor belongs to another actor".into(),
                    ));
                }
                self.object_stream(
                    &MemoryQuery::RecoverOrphans { actor, schema },
                    Some(*since),
                    requester,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graffiti_types::collect;
    use serde_json::json;

    fn alice() -> Session {
        Session::local("alice")
    }

    fn bob() -> Session {
        Session::local("bob")
    }

    fn channels(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    async fn put(store: &MemoryStore, value: Value, chans: &[&str], session: &Session) -> String {
        let before = store
            .put(PutObject::new(value, channels(chans)), session)
            .await
            .unwrap();
        assert!(before.tombstone);
        before.url
    }

    async fn discovered(
        store: &MemoryStore,
        chans: &[&str],
        session: Option<&Session>,
    ) -> (Vec<GraffitiObject>, String) {
        let mut stream = store
            .discover(&channels(chans), &json!({}), session)
            .await
            .unwrap();
        let (entries, ret) = collect(stream.as_mut()).await.unwrap();
        (
            entries.into_iter().filter_map(StreamEntry::into_element).collect(),
            ret.cursor,
        )
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemoryStore::new();
        let url = put(&store, json!({"a": 1}), &["c1"], &alice()).await;
        assert!(url.starts_with("local:"));

        let got = store.get(&url, &json!({}), Some(&alice())).await.unwrap();
        assert_eq!(got.value, json!({"a": 1}));
        assert_eq!(got.channels, channels(&["c1"]));
        assert_eq!(got.actor, "alice");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn put_returns_previous_state() {
        let store = MemoryStore::new();
        let url = put(&store, json!({"v": 1}), &[], &alice()).await;
        let previous = store
            .put(PutObject::new(json!({"v": 2}), vec![]).with_url(&url), &alice())
            .await
            .unwrap();
        assert_eq!(previous.value, json!({"v": 1}));
        assert!(!previous.tombstone);

        let current = store.get(&url, &json!({}), None).await.unwrap();
        assert_eq!(current.value, json!({"v": 2}));
        assert!(current.last_modified > previous.last_modified);
    }

    #[tokio::test]
    async fn put_rejections() {
        let store = MemoryStore::new();
        let mut object = PutObject::new(json!({}), vec![]);
        object.actor = Some("mallory".into());
        assert!(matches!(store.put(object, &alice()).await, Err(GraffitiError::Forbidden(_))));

        assert!(store.put(PutObject::new(json!([1]), vec![]), &alice()).await.is_err());

        let url = put(&store, json!({}), &[], &alice()).await;
        assert!(matches!(
            store.put(PutObject::new(json!({}), vec![]).with_url(&url), &bob()).await,
            Err(GraffitiError::Forbidden(_))
        ));
        assert!(matches!(
            store.put(PutObject::new(json!({}), vec![]).with_url("remote:x/1"), &alice()).await,
            Err(GraffitiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn get_masks_and_hides() {
        let store = MemoryStore::new();
        let url = {
            let object = PutObject::new(json!({"secret": true}), channels(&["c"]))
                .with_allowed(channels(&["bob", "carol"]));
            store.put(object, &alice()).await.unwrap().url
        };

        let as_bob = store.get(&url, &json!({}), Some(&bob())).await.unwrap();
        assert_eq!(as_bob.allowed, Some(channels(&["bob"])));
        assert!(as_bob.channels.is_empty());

        let as_alice = store.get(&url, &json!({}), Some(&alice())).await.unwrap();
        assert_eq!(as_alice.allowed, Some(channels(&["bob", "carol"])));

        for session in [None, Some(Session::local("eve"))] {
            assert!(matches!(
                store.get(&url, &json!({}), session.as_ref()).await,
                Err(GraffitiError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn get_checks_schema() {
        let store = MemoryStore::new();
        let url = put(&store, json!({"a": 1}), &[], &alice()).await;
        let schema = json!({"properties": {"a": {"type": "string"}}});
        assert!(matches!(
            store.get(&url, &schema, None).await,
            Err(GraffitiError::SchemaMismatch(_))
        ));
        assert!(matches!(
            store.get(&url, &json!({"type": 3}), None).await,
            Err(GraffitiError::InvalidSchema(_))
        ));
    }

    #[tokio::test]
    async fn patch_applies_each_list() {
        let store = MemoryStore::new();
        let url = put(&store, json!({"a": 1}), &["c1"], &alice()).await;
        let patch: GraffitiPatch = serde_json::from_value(json!({
            "value": [{"op": "remove", "path": "/a"}, {"op": "add", "path": "/b", "value": 2}],
            "channels": [{"op": "add", "path": "/-", "value": "c2"}],
            "allowed": [{"op": "add", "path": "", "value": []}]
        }))
        .unwrap();
        let before = store.patch(&patch, &url, &alice()).await.unwrap();
        assert_eq!(before.value, json!({"a": 1}));

        let after = store.get(&url, &json!({}), Some(&alice())).await.unwrap();
        assert_eq!(after.value, json!({"b": 2}));
        assert_eq!(after.channels, channels(&["c1", "c2"]));
        assert_eq!(after.allowed, Some(vec![]));
        assert!(after.last_modified > before.last_modified);
    }

    #[tokio::test]
    async fn patch_errors() {
        let store = MemoryStore::new();
        let url = put(&store, json!({"a": 1}), &[], &alice()).await;

        let test_failed: GraffitiPatch = serde_json::from_value(json!({
            "value": [{"op": "test", "path": "/a", "value": 2}]
        }))
        .unwrap();
        assert!(matches!(
            store.patch(&test_failed, &url, &alice()).await,
            Err(GraffitiError::PatchTestFailed(_))
        ));

        let bad_path: GraffitiPatch = serde_json::from_value(json!({
            "value": [{"op": "remove", "path": "/missing"}]
        }))
        .unwrap();
        assert!(matches!(
            store.patch(&bad_path, &url, &alice()).await,
            Err(GraffitiError::PatchError(_))
        ));

        let not_an_object: GraffitiPatch = serde_json::from_value(json!({
            "value": [{"op": "replace", "path": "", "value": 3}]
        }))
        .unwrap();
        assert!(matches!(
            store.patch(&not_an_object, &url, &alice()).await,
            Err(GraffitiError::PatchError(_))
        ));

        assert!(matches!(
            store.patch(&GraffitiPatch::default(), &url, &bob()).await,
            Err(GraffitiError::Forbidden(_))
        ));
        assert!(matches!(
            store.patch(&GraffitiPatch::default(), "local:nope", &alice()).await,
            Err(GraffitiError::NotFound(_))
        ));

        let unchanged = store.get(&url, &json!({}), None).await.unwrap();
        assert_eq!(unchanged.value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let store = MemoryStore::new();
        let url = put(&store, json!({"a": 1}), &["c"], &alice()).await;
        assert!(matches!(store.delete(&url, &bob()).await, Err(GraffitiError::Forbidden(_))));

        let deleted = store.delete(&url, &alice()).await.unwrap();
        assert!(deleted.tombstone);
        assert_eq!(deleted.url, url);
        assert!(matches!(
            store.get(&url, &json!({}), None).await,
            Err(GraffitiError::NotFound(_))
        ));
        assert!(matches!(store.delete(&url, &alice()).await, Err(GraffitiError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn discover_filters_channels_and_visibility() {
        let store = MemoryStore::new();
        put(&store, json!({"n": 1}), &["a"], &alice()).await;
        put(&store, json!({"n": 2}), &["b"], &alice()).await;
        store
            .put(
                PutObject::new(json!({"n": 3}), channels(&["a"])).with_allowed(vec![]),
                &alice(),
            )
            .await
            .unwrap();

        let (as_bob, _) = discovered(&store, &["a"], Some(&bob())).await;
        assert_eq!(as_bob.len(), 1);
        assert_eq!(as_bob[0].value, json!({"n": 1}));

        let (as_alice, _) = discovered(&store, &["a", "b"], Some(&alice())).await;
        assert_eq!(as_alice.len(), 3);
        let times: Vec<u64> = as_alice.iter().map(|o| o.last_modified).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn continue_reports_changes_and_tombstones() {
        let store = MemoryStore::new();
        let first = put(&store, json!({"n": 1}), &["a"], &alice()).await;
        let (objects, cursor) = discovered(&store, &["a"], None).await;
        assert_eq!(objects.len(), 1);

        let second = put(&store, json!({"n": 2}), &["a"], &alice()).await;
        put(&store, json!({"n": 3}), &["elsewhere"], &alice()).await;
        store.delete(&first, &alice()).await.unwrap();

        let mut stream = store.continue_object_stream(&cursor, None).await.unwrap();
        let (entries, ret) = collect(stream.as_mut()).await.unwrap();
        let objects: Vec<GraffitiObject> =
            entries.into_iter().filter_map(StreamEntry::into_element).collect();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].url, second);
        assert!(!objects[0].tombstone);
        assert_eq!(objects[1], GraffitiObject::tombstone(&first, objects[1].last_modified));

        let mut again = store.continue_object_stream(&ret.cursor, None).await.unwrap();
        let (entries, _) = collect(again.as_mut()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unknown_cursor() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.continue_object_stream("garbage", None).await,
            Err(GraffitiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn orphans_belong_to_the_session() {
        let store = MemoryStore::new();
        let orphan = put(&store, json!({}), &[], &alice()).await;
        put(&store, json!({}), &["c"], &alice()).await;
        put(&store, json!({}), &[], &bob()).await;

        let mut stream = store.recover_orphans(&json!({}), &alice()).await.unwrap();
        let (entries, ret) = collect(stream.as_mut()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].element().map(|o| o.url.as_str()), Some(orphan.as_str()));

        assert!(matches!(
            store.continue_object_stream(&ret.cursor, Some(&bob())).await,
            Err(GraffitiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn channel_stats_for_own_objects() {
        let store = MemoryStore::new();
        put(&store, json!({}), &["a", "b"], &alice()).await;
        put(&store, json!({}), &["a"], &alice()).await;
        put(&store, json!({}), &["a"], &bob()).await;

        let mut stream = store.channel_stats(&alice()).await.unwrap();
        let (entries, ()) = collect(stream.as_mut()).await.unwrap();
        let stats: Vec<ChannelStats> =
            entries.into_iter().filter_map(StreamEntry::into_element).collect();
        assert_eq!(stats.len(), 2);
        assert_eq!((stats[0].channel.as_str(), stats[0].count), ("a", 2));
        assert_eq!((stats[1].channel.as_str(), stats[1].count), ("b", 1));
        assert!(stats[0].last_modified >= stats[1].last_modified);
    }

    #[tokio::test]
    async fn origin_prefix() {
        let store = MemoryStore::for_origin("remote:http://127.0.0.1:3000/");
        assert_eq!(store.prefix(), "remote:http://127.0.0.1:3000/");
        let url = put(&store, json!({}), &[], &alice()).await;
        assert!(url.starts_with("remote:http://127.0.0.1:3000/"));
    }
}
