use async_trait::async_trait;
use serde_json::Value;

use graffiti_types::{
    ChannelStatsStream, GraffitiObject, GraffitiPatch, GraffitiResult, ObjectStream, PutObject,
    Session,
};

/// The logical contract shared by every Graffiti store: local, single-origin
/// remote, federated, and merged.
///
/// Implementations must satisfy these invariants:
/// - `last_modified` never decreases across successive writes to one url.
/// - An object's url is stable for its lifetime.
/// - Objects whose `allowed` list excludes the requester are never returned
///   to a requester other than their actor.
/// - A cursor returned by a stream resumes on the store that minted it.
#[async_trait]
pub trait GraffitiStore: Send + Sync {
    /// Read one object, validating its value against `schema`.
    async fn get(
        &self,
        url: &str,
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<GraffitiObject>;

    /// Create or replace an object. Returns the state the write replaced.
    async fn put(&self, object: PutObject, session: &Session) -> GraffitiResult<GraffitiObject>;

    /// Apply the independent value/channels/allowed patches. Returns the
    /// pre-patch state.
    async fn patch(
        &self,
        patch: &GraffitiPatch,
        url: &str,
        session: &Session,
    ) -> GraffitiResult<GraffitiObject>;

    /// Delete an object. Returns its final, tombstoned state.
    async fn delete(&self, url: &str, session: &Session) -> GraffitiResult<GraffitiObject>;

    /// Stream the objects posted to any of `channels` whose value matches
    /// `schema`.
    async fn discover(
        &self,
        channels: &[String],
        schema: &Value,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream>;

    /// Stream the session actor's objects that belong to no channel.
    async fn recover_orphans(
        &self,
        schema: &Value,
        session: &Session,
    ) -> GraffitiResult<ObjectStream>;

    /// Stream per-channel object counts for the session actor.
    async fn channel_stats(&self, session: &Session) -> GraffitiResult<ChannelStatsStream>;

    /// Resume a stream from the cursor it returned. The new stream carries
    /// every change since, tombstones included, and a fresh cursor.
    async fn continue_object_stream(
        &self,
        cursor: &str,
        session: Option<&Session>,
    ) -> GraffitiResult<ObjectStream>;
}
