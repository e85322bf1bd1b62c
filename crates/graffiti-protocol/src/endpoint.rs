/// HTTP endpoint paths served by every Graffiti origin.
///
/// Object urls map directly to `/{name}` under the origin; these are the
/// fixed paths alongside them.
pub mod endpoints {
    pub const CREATE: &str = "/create";
    pub const DISCOVER: &str = "/discover";
    pub const RECOVER_ORPHANS: &str = "/recover-orphans";
    pub const CONTINUE: &str = "/continue";
    pub const CHANNEL_STATS: &str = "/channel-stats";
}

/// Response header names (lowercase, as `HeaderMap` stores them).
pub mod headers {
    pub const LAST_MODIFIED: &str = "last-modified";
    pub const LAST_MODIFIED_MS: &str = "last-modified-ms";
    pub const ACTOR: &str = "actor";
    pub const CHANNELS: &str = "channels";
    pub const ALLOWED: &str = "allowed";
    pub const LOCATION: &str = "location";
}

/// Query parameter names.
pub mod params {
    pub const CHANNELS: &str = "channels";
    pub const ALLOWED: &str = "allowed";
    pub const SCHEMA: &str = "schema";
    pub const CURSOR: &str = "cursor";
}

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
