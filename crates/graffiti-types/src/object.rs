use json_patch::PatchOperation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON object published by an actor, tagged with channels and an optional
/// visibility list.
///
/// `url` is stable for the object's lifetime and `last_modified` never
/// decreases across successive writes to the same `url`. A deleted object is
/// still observable downstream with `tombstone` set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraffitiObject {
    pub url: String,
    pub actor: String,
    pub value: Value,
    pub channels: Vec<String>,
    /// `None` means public. `Some` (possibly empty) restricts visibility to
    /// the actor plus the listed identities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Epoch milliseconds.
    pub last_modified: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tombstone: bool,
}

impl GraffitiObject {
    /// A tombstone record as it travels on discovery streams: only `url` and
    /// `last_modified` are meaningful.
    pub fn tombstone(url: impl Into<String>, last_modified: u64) -> Self {
        Self {
            url: url.into(),
            actor: String::new(),
            value: Value::Object(Default::default()),
            channels: Vec::new(),
            allowed: None,
            last_modified,
            tombstone: true,
        }
    }

    /// Whether `requester` may see this object: they are its actor, the
    /// object is public, or they are listed in `allowed`.
    pub fn is_visible_to(&self, requester: Option<&str>) -> bool {
        match (&self.allowed, requester) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(allowed), Some(actor)) => {
                self.actor == actor || allowed.iter().any(|a| a == actor)
            }
        }
    }

    /// Whether any of `channels` tags this object.
    pub fn in_any_channel(&self, channels: &[String]) -> bool {
        channels.iter().any(|c| self.channels.contains(c))
    }
}

/// An object as submitted to `put`.
///
/// When `url` is absent the store assigns one. When `actor` is present it
/// must equal the session's actor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub value: Value,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl PutObject {
    pub fn new(value: Value, channels: Vec<String>) -> Self {
        Self {
            value,
            channels,
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_allowed(mut self, allowed: Vec<String>) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

/// Independently-optional JSON-patch operation lists for the three mutable
/// parts of an object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraffitiPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<PatchOperation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<PatchOperation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<PatchOperation>>,
}

impl GraffitiPatch {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.channels.is_none() && self.allowed.is_none()
    }
}

/// Per-channel statistics for the objects a session's actor owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub channel: String,
    pub count: u64,
    pub last_modified: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(allowed: Option<Vec<&str>>) -> GraffitiObject {
        GraffitiObject {
            url: "local:abc".into(),
            actor: "alice".into(),
            value: json!({"a": 1}),
            channels: vec!["c1".into()],
            allowed: allowed.map(|a| a.into_iter().map(String::from).collect()),
            last_modified: 10,
            tombstone: false,
        }
    }

    #[test]
    fn public_objects_are_visible_to_everyone() {
        let o = object(None);
        assert!(o.is_visible_to(None));
        assert!(o.is_visible_to(Some("bob")));
    }

    #[test]
    fn restricted_objects() {
        let o = object(Some(vec!["bob"]));
        assert!(o.is_visible_to(Some("alice")));
        assert!(o.is_visible_to(Some("bob")));
        assert!(!o.is_visible_to(Some("carol")));
        assert!(!o.is_visible_to(None));

        let private = object(Some(vec![]));
        assert!(private.is_visible_to(Some("alice")));
        assert!(!private.is_visible_to(Some("bob")));
    }

    #[test]
    fn serde_shape() {
        let o = object(None);
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["lastModified"], 10);
        assert!(v.get("allowed").is_none());
        assert!(v.get("tombstone").is_none());

        let t = GraffitiObject::tombstone("local:x", 5);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["tombstone"], true);
    }

    #[test]
    fn channel_membership() {
        let o = object(None);
        assert!(o.in_any_channel(&["c0".into(), "c1".into()]));
        assert!(!o.in_any_channel(&["c2".into()]));
        assert!(!o.in_any_channel(&[]));
    }

    #[test]
    fn patch_deserializes_operations() {
        let p: GraffitiPatch = serde_json::from_value(json!({
            "value": [{"op": "replace", "path": "/a", "value": 2}]
        }))
        .unwrap();
        assert_eq!(p.value.as_ref().map(Vec::len), Some(1));
        assert!(p.channels.is_none());
        assert!(!p.is_empty());
        assert!(GraffitiPatch::default().is_empty());
    }
}
