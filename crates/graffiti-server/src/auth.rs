use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use graffiti_protocol::decode_component;
use graffiti_types::{GraffitiError, Session};

use crate::error::ServerResult;

/// Who a request claims to come from.
///
/// The bearer token is the percent-encoded actor and is trusted as is;
/// verifying identities belongs in front of this server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> ServerResult<Self> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(Self::Anonymous);
        };
        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GraffitiError::Unauthorized("malformed Authorization header".into()))?;
        Ok(Self::Bearer(decode_component(token)?))
    }

    pub fn session(&self) -> Option<Session> {
        match self {
            Self::Bearer(actor) => Some(Session::local(actor.clone())),
            Self::Anonymous => None,
        }
    }

    /// The session, or `Unauthorized` for anonymous requests.
    pub fn require(&self) -> ServerResult<Session> {
        self.session().ok_or_else(|| {
            GraffitiError::Unauthorized("this operation requires an actor".into()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn anonymous_without_header() {
        let c = Credentials::from_headers(&HeaderMap::new()).unwrap();
        assert_eq!(c, Credentials::Anonymous);
        assert!(c.session().is_none());
        assert!(c.require().is_err());
    }

    #[test]
    fn bearer_is_percent_decoded() {
        let c = Credentials::from_headers(&headers("Bearer did%3Aweb%3Aalice")).unwrap();
        assert_eq!(c, Credentials::Bearer("did:web:alice".into()));
        assert_eq!(c.require().unwrap().actor(), "did:web:alice");
    }

    #[test]
    fn malformed_header_is_unauthorized() {
        for bad in ["Basic abc", "Bearer ", "alice"] {
            assert!(Credentials::from_headers(&headers(bad)).is_err());
        }
    }
}
