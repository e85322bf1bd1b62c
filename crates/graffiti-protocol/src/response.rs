use hyper::StatusCode;

use graffiti_types::{GraffitiError, GraffitiObject, GraffitiResult, HttpResponse};

use crate::classify::classify;
use crate::codec::decode_object;
use crate::lines::{EntryTransform, JsonLinesDecoder, ReturnTransform};

/// Fail with the classified error unless the response is 2xx or 410.
pub async fn check_response(response: &mut HttpResponse) -> GraffitiResult<()> {
    if response.status.is_success() || response.status == StatusCode::GONE {
        return Ok(());
    }
    let text = response.text().await?;
    response.body.release();
    match classify(response.status, &text) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Decode a single-object response.
pub async fn read_object(
    mut response: HttpResponse,
    known_url: Option<&str>,
) -> GraffitiResult<GraffitiObject> {
    check_response(&mut response).await?;
    let body = response.bytes().await?;
    decode_object(response.status, &response.headers, &body, known_url)
}

/// Open a streamed JSON-lines response. Only a plain 200 carries a stream.
pub async fn open_lines<T, R>(
    mut response: HttpResponse,
    origin: &str,
    to_entry: EntryTransform<T>,
    to_return: ReturnTransform<R>,
) -> GraffitiResult<JsonLinesDecoder<T, R>> {
    check_response(&mut response).await?;
    if response.status != StatusCode::OK {
        response.body.release();
        return Err(GraffitiError::InvalidResponse(format!(
            "expected a streamed 200 response, got {}",
            response.status
        )));
    }
    Ok(JsonLinesDecoder::new(response.body, origin, to_entry, to_return))
}
