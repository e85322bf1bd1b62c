use json_patch::PatchOperation;
use serde_json::{json, Value};

use graffiti_protocol::{decode_component, decode_string_list, params};
use graffiti_types::GraffitiError;

use crate::error::ServerResult;

/// Query parameters of an incoming request.
///
/// Parsed from the raw query string: list values are comma-joined and
/// percent-encoded per element, so they must be split before decoding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestQuery {
    pub channels: Option<Vec<String>>,
    pub allowed: Option<Vec<String>>,
    pub schema: Option<Value>,
    pub cursor: Option<String>,
}

impl RequestQuery {
    pub fn parse(raw: Option<&str>) -> ServerResult<Self> {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return Ok(query);
        };
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                params::CHANNELS => query.channels = Some(decode_string_list(value)?),
                params::ALLOWED => query.allowed = Some(decode_string_list(value)?),
                params::SCHEMA => {
                    let text = decode_component(value)?;
                    let schema = serde_json::from_str(&text).map_err(|e| {
                        GraffitiError::InvalidSchema(format!("schema is not valid JSON: {e}"))
                    })?;
                    query.schema = Some(schema);
                }
                params::CURSOR => query.cursor = Some(decode_component(value)?),
                _ => {}
            }
        }
        Ok(query)
    }

    /// The requested schema; no schema accepts everything.
    pub fn schema(&self) -> Value {
        self.schema.clone().unwrap_or_else(|| json!({}))
    }
}

/// Parse each query entry as one JSON-patch operation.
pub fn patch_operations(entries: &[String], field: &str) -> ServerResult<Vec<PatchOperation>> {
    entries
        .iter()
        .map(|entry| {
            serde_json::from_str(entry).map_err(|e| {
                GraffitiError::PatchError(format!("invalid {field} patch: {e}")).into()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graffiti_protocol::{encode_component, encode_query_params, QueryParams};

    #[test]
    fn parses_what_clients_encode() {
        let channels = vec!["a,b".to_string(), "ünï code".to_string(), "c&d=e".to_string()];
        let allowed: Vec<String> = vec![];
        let schema = json!({"properties": {"x": {"type": "string"}}});
        let url = encode_query_params(
            "http://h/discover",
            &QueryParams {
                channels: Some(&channels),
                allowed: Some(&allowed),
                schema: Some(&schema),
                cursor: Some("a b"),
            },
        );
        let (_, raw) = url.split_once('?').unwrap();
        let q = RequestQuery::parse(Some(raw)).unwrap();
        assert_eq!(q.channels, Some(channels));
        assert_eq!(q.allowed, Some(vec![]));
        assert_eq!(q.schema, Some(schema));
        assert_eq!(q.cursor.as_deref(), Some("a b"));
    }

    #[test]
    fn absent_parameters() {
        let q = RequestQuery::parse(None).unwrap();
        assert_eq!(q, RequestQuery::default());
        assert_eq!(q.schema(), json!({}));
        assert!(RequestQuery::parse(Some("other=1")).unwrap().channels.is_none());
    }

    #[test]
    fn bad_schema_is_invalid_schema() {
        let raw = format!("schema={}", encode_component("{not json"));
        assert!(matches!(
            RequestQuery::parse(Some(&raw)),
            Err(crate::ServerError::Graffiti(GraffitiError::InvalidSchema(_)))
        ));
    }

    #[test]
    fn patch_entries() {
        let ops = patch_operations(&[r#"{"op":"add","path":"/-","value":"c"}"#.to_string()], "channels")
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert!(patch_operations(&["{}".to_string()], "channels").is_err());
    }
}
