//! JSON shapes carried by streamed bodies.
//!
//! An object stream line is either `{"object": {...}}` for a live object or
//! `{"object": {"url", "lastModified"}, "tombstone": true}` for a deletion.
//! A channel-stats line is `{"value": {"channel", "count", "lastModified"}}`.
//! An object stream ends with `{"cursor": "..."}`.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use graffiti_types::{ChannelStats, GraffitiError, GraffitiObject, GraffitiResult, ObjectStreamReturn};

#[derive(Deserialize)]
struct Entry {
    object: Value,
    #[serde(default)]
    tombstone: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveObject {
    url: String,
    actor: String,
    value: Map<String, Value>,
    channels: Vec<String>,
    #[serde(default)]
    allowed: Option<Vec<String>>,
    last_modified: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tombstone {
    url: String,
    last_modified: u64,
}

#[derive(Deserialize)]
struct StatsEntry {
    value: ChannelStats,
}

fn not_graffiti(what: &str, e: impl std::fmt::Display) -> GraffitiError {
    GraffitiError::ProtocolViolation(format!("source returned a non-{what} object: {e}"))
}

/// Parse one object stream line. Tombstones carry only their url and
/// modification time.
pub fn parse_object_entry(line: Value) -> GraffitiResult<GraffitiObject> {
    let entry: Entry = serde_json::from_value(line).map_err(|e| not_graffiti("Graffiti", e))?;
    if entry.tombstone == Some(true) {
        let t: Tombstone =
            serde_json::from_value(entry.object).map_err(|e| not_graffiti("Graffiti", e))?;
        return Ok(GraffitiObject::tombstone(t.url, t.last_modified));
    }
    let o: LiveObject =
        serde_json::from_value(entry.object).map_err(|e| not_graffiti("Graffiti", e))?;
    Ok(GraffitiObject {
        url: o.url,
        actor: o.actor,
        value: Value::Object(o.value),
        channels: o.channels,
        allowed: o.allowed,
        last_modified: o.last_modified,
        tombstone: false,
    })
}

/// Inverse of [`parse_object_entry`].
pub fn object_entry(object: &GraffitiObject) -> Value {
    if object.tombstone {
        return json!({
            "object": {"url": object.url, "lastModified": object.last_modified},
            "tombstone": true,
        });
    }
    json!({ "object": object })
}

/// Parse the terminal line of an object stream.
pub fn parse_cursor_return(terminal: Option<Value>) -> GraffitiResult<ObjectStreamReturn> {
    let terminal = terminal.ok_or_else(|| {
        GraffitiError::ProtocolViolation("object stream ended without a cursor".into())
    })?;
    serde_json::from_value(terminal).map_err(|e| not_graffiti("cursor", e))
}

pub fn cursor_return(ret: &ObjectStreamReturn) -> Value {
    json!({ "cursor": ret.cursor })
}

pub fn parse_channel_stats_entry(line: Value) -> GraffitiResult<ChannelStats> {
    serde_json::from_value::<StatsEntry>(line)
        .map(|e| e.value)
        .map_err(|e| not_graffiti("channel-stats", e))
}

pub fn channel_stats_entry(stats: &ChannelStats) -> Value {
    json!({ "value": stats })
}

/// Channel-stats streams have no terminal value.
pub fn parse_empty_return(terminal: Option<Value>) -> GraffitiResult<()> {
    match terminal {
        None => Ok(()),
        Some(other) => Err(GraffitiError::ProtocolViolation(format!(
            "unexpected return value from channel stats: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> GraffitiObject {
        GraffitiObject {
            url: "remote:pod.example/1".into(),
            actor: "alice".into(),
            value: json!({"a": 1}),
            channels: vec!["c1".into()],
            allowed: Some(vec!["bob".into()]),
            last_modified: 42,
            tombstone: false,
        }
    }

    #[test]
    fn live_entry() {
        let o = live();
        let line = object_entry(&o);
        assert!(line.get("tombstone").is_none());
        assert_eq!(parse_object_entry(line).unwrap(), o);
    }

    #[test]
    fn tombstone_entry_keeps_only_url_and_time() {
        let mut o = live();
        o.tombstone = true;
        let line = object_entry(&o);
        assert_eq!(line["object"], json!({"url": "remote:pod.example/1", "lastModified": 42}));
        let parsed = parse_object_entry(line).unwrap();
        assert_eq!(parsed, GraffitiObject::tombstone("remote:pod.example/1", 42));
    }

    #[test]
    fn explicit_false_tombstone_is_live() {
        let line = json!({"object": serde_json::to_value(live()).unwrap(), "tombstone": false});
        assert!(!parse_object_entry(line).unwrap().tombstone);
    }

    #[test]
    fn structural_failures_are_protocol_violations() {
        for line in [
            json!(1),
            json!({"notObject": {}}),
            json!({"object": {"url": "x"}}),
            json!({"object": {"url": "x", "actor": "a", "value": [1], "channels": [], "lastModified": 1}}),
            json!({"object": {"lastModified": 1}, "tombstone": true}),
        ] {
            assert!(matches!(
                parse_object_entry(line),
                Err(GraffitiError::ProtocolViolation(_))
            ));
        }
    }

    #[test]
    fn cursor_and_stats() {
        assert_eq!(
            parse_cursor_return(Some(json!({"cursor": "abc"}))).unwrap().cursor,
            "abc"
        );
        assert!(parse_cursor_return(None).is_err());
        assert!(parse_cursor_return(Some(json!({"cursor": 1}))).is_err());

        let stats = ChannelStats { channel: "c".into(), count: 3, last_modified: 9 };
        assert_eq!(parse_channel_stats_entry(channel_stats_entry(&stats)).unwrap(), stats);
        assert!(parse_channel_stats_entry(json!({"value": {"channel": "c"}})).is_err());

        assert!(parse_empty_return(None).is_ok());
        assert!(parse_empty_return(Some(json!({}))).is_err());
    }
}
