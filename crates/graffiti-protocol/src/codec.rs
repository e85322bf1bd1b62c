//! Translation between the HTTP wire form (query parameters, headers, JSON
//! bodies) and [`GraffitiObject`]s.

use chrono::{DateTime, Utc};
use hyper::{HeaderMap, StatusCode};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use graffiti_types::{GraffitiError, GraffitiObject, GraffitiResult, REMOTE_SCHEME};

use crate::endpoint::{headers, params};

/// Everything `encodeURIComponent` leaves alone stays literal.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

pub fn decode_component(encoded: &str) -> GraffitiResult<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| GraffitiError::InvalidResponse(format!("invalid percent-encoding: {e}")))
}

/// Percent-encode each element and join with commas.
///
/// Empty elements do not survive the trip: [`decode_string_list`] drops
/// empty segments, so `[""]` and `[]` both decode to `[]`. Every other list
/// round-trips exactly.
pub fn encode_string_list<S: AsRef<str>>(list: &[S]) -> String {
    list.iter()
        .map(|s| encode_component(s.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`encode_string_list`]. Empty segments are dropped, so an empty
/// string decodes to an empty list.
pub fn decode_string_list(encoded: &str) -> GraffitiResult<Vec<String>> {
    encoded
        .split(',')
        .filter(|s| !s.is_empty())
        .map(decode_component)
        .collect()
}

/// Optional query parameters for a request to an origin.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryParams<'a> {
    pub channels: Option<&'a [String]>,
    pub allowed: Option<&'a [String]>,
    pub schema: Option<&'a Value>,
    pub cursor: Option<&'a str>,
}

/// Append every present parameter to `url`, always in the order channels,
/// allowed, schema, cursor.
pub fn encode_query_params(url: &str, query: &QueryParams<'_>) -> String {
    let mut pairs = Vec::with_capacity(4);
    if let Some(channels) = query.channels {
        pairs.push(format!("{}={}", params::CHANNELS, encode_string_list(channels)));
    }
    if let Some(allowed) = query.allowed {
        pairs.push(format!("{}={}", params::ALLOWED, encode_string_list(allowed)));
    }
    if let Some(schema) = query.schema {
        pairs.push(format!("{}={}", params::SCHEMA, encode_component(&schema.to_string())));
    }
    if let Some(cursor) = query.cursor {
        pairs.push(format!("{}={}", params::CURSOR, encode_component(cursor)));
    }
    if pairs.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", pairs.join("&"))
}

/// Strip the `remote:` scheme, defaulting to `https://` when the remainder
/// names no transport.
pub fn url_to_http_url(url: &str) -> GraffitiResult<String> {
    let Some(rest) = url.strip_prefix(REMOTE_SCHEME) else {
        return Err(GraffitiError::UnrecognizedUrlScheme(format!(
            "the url does not use the '{REMOTE_SCHEME}' scheme: {url}"
        )));
    };
    if rest.starts_with("https://") || rest.starts_with("http://") {
        Ok(rest.to_string())
    } else {
        Ok(format!("https://{rest}"))
    }
}

/// Render epoch milliseconds as the `Last-Modified` / `Last-Modified-Ms`
/// header pair.
pub fn encode_last_modified(last_modified: u64) -> (String, String) {
    let millis = i64::try_from(last_modified).unwrap_or(i64::MAX);
    let date = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
    (
        date.format(HTTP_DATE_FORMAT).to_string(),
        (last_modified % 1000).to_string(),
    )
}

/// Combine the second-resolution `Last-Modified` date with the
/// `Last-Modified-Ms` remainder.
pub fn decode_last_modified(header_map: &HeaderMap) -> GraffitiResult<u64> {
    let date = header_str(header_map, headers::LAST_MODIFIED)?.ok_or_else(|| {
        GraffitiError::InvalidResponse("response without Last-Modified header".into())
    })?;
    let millis = header_str(header_map, headers::LAST_MODIFIED_MS)?.ok_or_else(|| {
        GraffitiError::InvalidResponse("response without Last-Modified-Ms header".into())
    })?;

    let date = DateTime::parse_from_rfc2822(date.trim()).map_err(|e| {
        GraffitiError::InvalidResponse(format!("invalid Last-Modified header: {e}"))
    })?;
    let millis: u64 = millis
        .trim()
        .parse()
        .ok()
        .filter(|ms| *ms < 1000)
        .ok_or_else(|| {
            GraffitiError::InvalidResponse(format!("invalid Last-Modified-Ms header: {millis}"))
        })?;
    let seconds = u64::try_from(date.timestamp()).map_err(|_| {
        GraffitiError::InvalidResponse("Last-Modified header predates the epoch".into())
    })?;
    Ok(seconds * 1000 + millis)
}

/// Decode a single-object response.
///
/// `known_url` is the url the caller addressed; when absent (server-assigned
/// creation) the url comes from the `Location` header. A 410 status marks
/// the returned state as a tombstone.
pub fn decode_object(
    status: StatusCode,
    header_map: &HeaderMap,
    body: &[u8],
    known_url: Option<&str>,
) -> GraffitiResult<GraffitiObject> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        GraffitiError::InvalidResponse(format!("received invalid JSON from server: {e}"))
    })?;
    let last_modified = decode_last_modified(header_map)?;
    let actor = header_str(header_map, headers::ACTOR)?
        .ok_or_else(|| GraffitiError::InvalidResponse("response without Actor header".into()))
        .and_then(decode_component)?;

    let url = match known_url {
        Some(url) => url.to_string(),
        None => header_str(header_map, headers::LOCATION)?
            .ok_or_else(|| {
                GraffitiError::InvalidResponse("response without Location header".into())
            })
            .and_then(decode_component)?,
    };

    let channels = match header_str(header_map, headers::CHANNELS)? {
        Some(raw) => decode_string_list(raw)?,
        None => Vec::new(),
    };
    let allowed = header_str(header_map, headers::ALLOWED)?
        .map(decode_string_list)
        .transpose()?;

    Ok(GraffitiObject {
        url,
        actor,
        value,
        channels,
        allowed,
        last_modified,
        tombstone: status == StatusCode::GONE,
    })
}

fn header_str<'a>(header_map: &'a HeaderMap, name: &str) -> GraffitiResult<Option<&'a str>> {
    header_map
        .get(name)
        .map(|v| {
            v.to_str().map_err(|_| {
                GraffitiError::InvalidResponse(format!("non-ASCII {name} header"))
            })
        })
        .transpose()
}
