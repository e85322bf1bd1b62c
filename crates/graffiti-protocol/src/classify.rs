use hyper::StatusCode;
use serde_json::Value;

use graffiti_types::GraffitiError;

/// Map a response status and body text onto the error taxonomy.
///
/// Returns `None` for 2xx and for 410 (a tombstoned resource, handled by the
/// caller). Every other status resolves to exactly one error; anything
/// unrecognized falls back to [`GraffitiError::Unclassified`].
pub fn classify(status: StatusCode, body: &str) -> Option<GraffitiError> {
    if status.is_success() || status == StatusCode::GONE {
        return None;
    }
    let text = error_message(body);
    let error = match status.as_u16() {
        404 => GraffitiError::NotFound(text),
        403 => GraffitiError::Forbidden(text),
        401 => GraffitiError::Unauthorized(text),
        422 if text.starts_with("PatchError") => GraffitiError::PatchError(text),
        422 if text.starts_with("InvalidSchema") => GraffitiError::InvalidSchema(text),
        412 if text.starts_with("PatchTestFailed") => GraffitiError::PatchTestFailed(text),
        412 if text.starts_with("SchemaMismatch") => GraffitiError::SchemaMismatch(text),
        status => GraffitiError::Unclassified {
            status,
            message: text,
        },
    };
    Some(error)
}

/// The `message` field of a JSON error body, or the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message").map(|m| match m {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .unwrap_or_else(|| body.to_string())
}
