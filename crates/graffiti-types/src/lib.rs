//! Foundation types for the Graffiti federated object store.
//!
//! Every other Graffiti crate depends on `graffiti-types`.
//!
//! # Key Types
//!
//! - [`GraffitiObject`] -- a published JSON object with channels and visibility
//! - [`GraffitiPatch`] -- independent JSON-patch lists for value, channels, allowed
//! - [`Session`] -- local-only or remote-capable identity
//! - [`GraffitiStream`] -- pull-based stream of [`StreamEntry`] ending in a terminal value
//! - [`Cursor`] -- versioned composite resumption token
//! - [`HttpClient`] -- the HTTP capability carried by remote sessions
//! - [`GraffitiError`] -- the closed error taxonomy

pub mod cursor;
pub mod error;
pub mod http;
pub mod object;
pub mod session;
pub mod stream;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod url;

pub use cursor::{Cursor, CursorKind, CursorLeg, CURSOR_VERSION};
pub use error::{GraffitiError, GraffitiResult};
pub use http::{BodyReader, ChunkedBody, HttpClient, HttpRequest, HttpResponse};
pub use object::{ChannelStats, GraffitiObject, GraffitiPatch, PutObject};
pub use session::{actor_of, Session};
pub use stream::{
    collect, ChannelStatsStream, GraffitiStream, ObjectStream, ObjectStreamReturn, Step,
    StreamEntry, VecStream,
};
#[cfg(any(test, feature = "testing"))]
pub use testing::{ScriptedClient, ScriptedResponse};
pub use url::{UrlScheme, LOCAL_SCHEME, REMOTE_SCHEME};
