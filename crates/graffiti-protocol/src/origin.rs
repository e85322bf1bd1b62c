//! Origin tokens.
//!
//! An origin token is the `remote:` scheme followed by the serialized web
//! origin of a url, with the default `https://` transport left implicit:
//! `remote:pod.example` or `remote:http://127.0.0.1:3000`. Host case and
//! default ports are normalized away, so every spelling of one origin maps
//! to one token and tokens can be compared textually.

use url::Url;

use graffiti_types::{GraffitiError, GraffitiResult, REMOTE_SCHEME};

use crate::codec::url_to_http_url;

fn parse_remote(url: &str) -> GraffitiResult<Url> {
    let no_origin = || GraffitiError::UnrecognizedUrlScheme(format!("no origin in url: {url}"));
    let http = url_to_http_url(url)?;
    let authority = ["https://", "http://"]
        .into_iter()
        .find_map(|t| http.strip_prefix(t))
        .unwrap_or_default();
    if authority.is_empty() || authority.starts_with(['/', '?', '#']) {
        return Err(no_origin());
    }
    let parsed = Url::parse(&http).map_err(|_| no_origin())?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(no_origin());
    }
    Ok(parsed)
}

fn token(parsed: &Url) -> String {
    let origin = parsed.origin().ascii_serialization();
    let origin = origin.strip_prefix("https://").unwrap_or(&origin);
    format!("{REMOTE_SCHEME}{origin}")
}

/// The origin token of a `remote:` url.
pub fn origin_of(url: &str) -> GraffitiResult<String> {
    parse_remote(url).map(|parsed| token(&parsed))
}

/// Normalize a configured origin token, rejecting anything with a path,
/// query or fragment.
pub fn normalize_origin(raw: &str) -> GraffitiResult<String> {
    let parsed = parse_remote(raw.trim_end_matches('/'))?;
    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(GraffitiError::UnrecognizedUrlScheme(format!(
            "not an origin token: {raw}"
        )));
    }
    Ok(token(&parsed))
}
