//! Object url schemes.
//!
//! Every object url is prefixed with the scheme of the store that holds it:
//! `local:` for the in-process store, `remote:<origin>` for an HTTP origin.

use crate::error::{GraffitiError, GraffitiResult};

pub const LOCAL_SCHEME: &str = "local:";
pub const REMOTE_SCHEME: &str = "remote:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlScheme {
    Local,
    Remote,
}

impl UrlScheme {
    /// Classify `url` by its scheme prefix.
    pub fn of(url: &str) -> GraffitiResult<Self> {
        if url.starts_with(REMOTE_SCHEME) {
            Ok(Self::Remote)
        } else if url.starts_with(LOCAL_SCHEME) {
            Ok(Self::Local)
        } else {
            Err(GraffitiError::UnrecognizedUrlScheme(format!(
                "unrecognized url scheme: {url}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify() {
        assert_eq!(UrlScheme::of("local:abc").unwrap(), UrlScheme::Local);
        assert_eq!(UrlScheme::of("remote:pod.example/abc").unwrap(), UrlScheme::Remote);
        assert!(matches!(
            UrlScheme::of("https://pod.example/abc"),
            Err(GraffitiError::UnrecognizedUrlScheme(_))
        ));
    }
}
