//! Per-entry validation applied to every object an origin streams back.
//!
//! Nothing an origin returns is trusted. Each decoded line passes through
//! the wire envelope check and then through an ordered list of stages; the
//! first stage to reject it turns the line into a stream error entry and the
//! stream carries on with the next line.

use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;
use tracing::warn;

use graffiti_protocol::envelope::parse_object_entry;
use graffiti_protocol::{normalize_origin, origin_of};
use graffiti_store::check_schema;
use graffiti_types::{GraffitiError, GraffitiObject, GraffitiResult};

// ---------------------------------------------------------------------------
// EntryStage trait
// ---------------------------------------------------------------------------

/// One check in the entry pipeline.
pub trait EntryStage: Send + Sync {
    /// Short name used in logs (e.g. "origin", "access").
    fn name(&self) -> &str;

    /// Whether this stage also inspects tombstones. Tombstones carry only a
    /// url and a timestamp, so most stages skip them.
    fn checks_tombstones(&self) -> bool {
        false
    }

    fn check(&self, object: &GraffitiObject) -> GraffitiResult<()>;
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Rejects objects whose url is not under the queried origin. Urls are
/// compared by normalized origin token, so any spelling of the queried
/// origin passes.
pub struct OriginStage {
    origin: String,
}

impl OriginStage {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: normalize_origin(origin).unwrap_or_else(|_| origin.to_string()),
        }
    }
}

impl EntryStage for OriginStage {
    fn name(&self) -> &str {
        "origin"
    }

    fn checks_tombstones(&self) -> bool {
        true
    }

    fn check(&self, object: &GraffitiObject) -> GraffitiResult<()> {
        if origin_of(&object.url).is_ok_and(|origin| origin == self.origin) {
            Ok(())
        } else {
            Err(GraffitiError::ProtocolViolation(format!(
                "origin returned an object claiming to be from another origin: {}",
                object.url
            )))
        }
    }
}

/// Rejects objects the requester is not allowed to see.
pub struct AccessStage {
    requester: Option<String>,
}

impl AccessStage {
    pub fn new(requester: Option<&str>) -> Self {
        Self {
            requester: requester.map(str::to_string),
        }
    }
}

impl EntryStage for AccessStage {
    fn name(&self) -> &str {
        "access"
    }

    fn check(&self, object: &GraffitiObject) -> GraffitiResult<()> {
        if object.is_visible_to(self.requester.as_deref()) {
            Ok(())
        } else {
            Err(GraffitiError::ProtocolViolation(
                "origin returned an object that the session is not allowed to see".into(),
            ))
        }
    }
}

/// What the query asked for.
#[derive(Clone, Debug)]
pub enum Desired {
    /// Objects in at least one of these channels.
    InChannels(Vec<String>),
    /// Channel-less objects owned by this actor.
    OrphanOf(String),
}

pub struct DesiredStage {
    desired: Desired,
}

impl DesiredStage {
    pub fn new(desired: Desired) -> Self {
        Self { desired }
    }
}

impl EntryStage for DesiredStage {
    fn name(&self) -> &str {
        "desired"
    }

    fn check(&self, object: &GraffitiObject) -> GraffitiResult<()> {
        let reason = match &self.desired {
            Desired::InChannels(channels) if !object.in_any_channel(channels) => {
                "origin returned an object not in the requested channels"
            }
            Desired::OrphanOf(actor) if object.actor != *actor => {
                "origin returned an object not owned by the session"
            }
            Desired::OrphanOf(_) if !object.channels.is_empty() => {
                "origin returned an orphan with channels"
            }
            _ => return Ok(()),
        };
        Err(GraffitiError::ProtocolViolation(reason.into()))
    }
}

/// Rejects objects whose value does not match the caller's schema.
pub struct SchemaStage {
    validator: Arc<Validator>,
}

impl SchemaStage {
    pub fn new(validator: Arc<Validator>) -> Self {
        Self { validator }
    }
}

impl EntryStage for SchemaStage {
    fn name(&self) -> &str {
        "schema"
    }

    fn check(&self, object: &GraffitiObject) -> GraffitiResult<()> {
        check_schema(&self.validator, object)
    }
}

// ---------------------------------------------------------------------------
// EntryPipeline
// ---------------------------------------------------------------------------

/// Envelope parsing followed by the stages, in order, failing fast.
pub struct EntryPipeline {
    stages: Vec<Box<dyn EntryStage>>,
}

impl EntryPipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// The standard pipeline: origin, access, then the optional desired and
    /// schema stages.
    pub fn standard(
        origin: &str,
        requester: Option<&str>,
        desired: Option<Desired>,
        validator: Option<Arc<Validator>>,
    ) -> Self {
        let mut pipeline = Self::new()
            .with_stage(OriginStage::new(origin))
            .with_stage(AccessStage::new(requester));
        if let Some(desired) = desired {
            pipeline = pipeline.with_stage(DesiredStage::new(desired));
        }
        if let Some(validator) = validator {
            pipeline = pipeline.with_stage(SchemaStage::new(validator));
        }
        pipeline
    }

    pub fn with_stage(mut self, stage: impl EntryStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn process(&self, line: Value) -> GraffitiResult<GraffitiObject> {
        let object = parse_object_entry(line)?;
        for stage in &self.stages {
            if object.tombstone && !stage.checks_tombstones() {
                continue;
            }
            if let Err(e) = stage.check(&object) {
                if matches!(e, GraffitiError::ProtocolViolation(_)) {
                    warn!(stage = stage.name(), url = %object.url, error = %e, "rejected stream entry");
                }
                return Err(e);
            }
        }
        Ok(object)
    }
}

impl Default for EntryPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graffiti_store::SchemaCache;
    use serde_json::json;

    const ORIGIN: &str = "remote:pod.example";

    fn line(url: &str, actor: &str, channels: &[&str], allowed: Option<&[&str]>) -> Value {
        let mut object = json!({
            "url": url,
            "actor": actor,
            "value": {"n": 1},
            "channels": channels,
            "lastModified": 5,
        });
        if let Some(allowed) = allowed {
            object["allowed"] = json!(allowed);
        }
        json!({ "object": object })
    }

    fn discover_pipeline(requester: Option<&str>) -> EntryPipeline {
        EntryPipeline::standard(
            ORIGIN,
            requester,
            Some(Desired::InChannels(vec!["c".into()])),
            None,
        )
    }

    #[test]
    fn accepts_conforming_entries() {
        let p = discover_pipeline(Some("bob"));
        assert_eq!(p.stage_count(), 3);
        let o = p.process(line("remote:pod.example/1", "alice", &["c"], None)).unwrap();
        assert_eq!(o.actor, "alice");
        assert!(p
            .process(line("remote:pod.example/1", "alice", &["c", "d"], Some(&["bob"][..])))
            .is_ok());
    }

    #[test]
    fn rejects_spoofed_origins() {
        let p = discover_pipeline(None);
        for url in ["remote:evil.example/1", "remote:pod.example.evil/1"] {
            assert!(matches!(
                p.process(line(url, "alice", &["c"], None)),
                Err(GraffitiError::ProtocolViolation(_))
            ));
        }
        let tombstone = json!({"object": {"url": "remote:evil.example/1", "lastModified": 1}, "tombstone": true});
        assert!(p.process(tombstone).is_err());
    }

    #[test]
    fn accepts_other_spellings_of_the_origin() {
        let p = discover_pipeline(None);
        for url in ["remote:https://pod.example/1", "remote:POD.example/1", "remote:https://pod.example:443/1"] {
            assert!(p.process(line(url, "alice", &["c"], None)).is_ok(), "{url}");
        }
        assert!(p.process(line("remote:http://pod.example/1", "alice", &["c"], None)).is_err());
    }

    #[test]
    fn tombstones_skip_content_checks() {
        let p = EntryPipeline::standard(
            ORIGIN,
            Some("bob"),
            Some(Desired::OrphanOf("bob".into())),
            None,
        );
        let tombstone = json!({"object": {"url": "remote:pod.example/9", "lastModified": 1}, "tombstone": true});
        let o = p.process(tombstone).unwrap();
        assert!(o.tombstone);
    }

    #[test]
    fn rejects_hidden_objects() {
        let p = discover_pipeline(Some("eve"));
        let hidden = line("remote:pod.example/1", "alice", &["c"], Some(&["bob"][..]));
        assert!(matches!(p.process(hidden.clone()), Err(GraffitiError::ProtocolViolation(_))));
        assert!(discover_pipeline(None).process(hidden).is_err());
    }

    #[test]
    fn rejects_undesired_objects() {
        let p = discover_pipeline(None);
        assert!(p.process(line("remote:pod.example/1", "alice", &["other"], None)).is_err());

        let orphans = EntryPipeline::standard(ORIGIN, Some("bob"), Some(Desired::OrphanOf("bob".into())), None);
        assert!(orphans.process(line("remote:pod.example/1", "bob", &[], None)).is_ok());
        assert!(orphans.process(line("remote:pod.example/1", "bob", &["c"], None)).is_err());
        assert!(orphans.process(line("remote:pod.example/1", "alice", &[], None)).is_err());
    }

    #[test]
    fn schema_mismatch_is_its_own_error() {
        let validator = SchemaCache::new()
            .compile(&json!({"properties": {"n": {"type": "string"}}}))
            .unwrap();
        let p = EntryPipeline::standard(ORIGIN, None, None, Some(validator));
        assert!(matches!(
            p.process(line("remote:pod.example/1", "alice", &[], None)),
            Err(GraffitiError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn malformed_envelopes() {
        let p = discover_pipeline(None);
        assert!(matches!(
            p.process(json!({"url": "remote:pod.example/1"})),
            Err(GraffitiError::ProtocolViolation(_))
        ));
    }
}
