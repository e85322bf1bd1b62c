//! Wire protocol spoken between Graffiti clients and origins.
//!
//! - [`codec`]: query parameters, headers and single-object bodies
//! - [`classify`]: HTTP status and body text to [`GraffitiError`]
//! - [`lines`]: the streamed JSON-lines decoder
//! - [`origin`]: normalized origin tokens
//! - [`envelope`]: the JSON shapes carried inside streams
//! - [`transport`]: a `reqwest` implementation of the HTTP capability
//!
//! [`GraffitiError`]: graffiti_types::GraffitiError

pub mod classify;
pub mod codec;
pub mod endpoint;
pub mod envelope;
pub mod lines;
pub mod origin;
pub mod response;
pub mod transport;

pub use classify::classify;
pub use codec::{
    decode_component, decode_last_modified, decode_object, decode_string_list, encode_component,
    encode_last_modified, encode_query_params, encode_string_list, url_to_http_url, QueryParams,
};
pub use endpoint::{endpoints, headers, params, JSON_CONTENT_TYPE, STREAM_CONTENT_TYPE};
pub use lines::{EntryTransform, JsonLinesDecoder, ReturnTransform};
pub use origin::{normalize_origin, origin_of};
pub use response::{check_response, open_lines, read_object};
pub use transport::ReqwestClient;
