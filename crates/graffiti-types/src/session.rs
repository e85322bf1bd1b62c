use std::sync::Arc;

use crate::http::HttpClient;

/// The identity a call is made on behalf of.
///
/// Only `Remote` sessions carry an HTTP-issuing capability; that capability
/// is the sole discriminator used to route calls between local and remote
/// stores.
#[derive(Clone)]
pub enum Session {
    Local { actor: String },
    Remote { actor: String, http: Arc<dyn HttpClient> },
}

impl Session {
    pub fn local(actor: impl Into<String>) -> Self {
        Self::Local { actor: actor.into() }
    }

    pub fn remote(actor: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self::Remote {
            actor: actor.into(),
            http,
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            Self::Local { actor } | Self::Remote { actor, .. } => actor,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// The HTTP capability, if this session is remote-capable.
    pub fn http(&self) -> Option<&Arc<dyn HttpClient>> {
        match self {
            Self::Remote { http, .. } => Some(http),
            Self::Local { .. } => None,
        }
    }

    /// Keep the session only if it can reach remote stores.
    pub fn remote_only(session: Option<&Session>) -> Option<&Session> {
        session.filter(|s| s.is_remote())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { actor } => f.debug_struct("Local").field("actor", actor).finish(),
            Self::Remote { actor, .. } => f
                .debug_struct("Remote")
                .field("actor", actor)
                .finish_non_exhaustive(),
        }
    }
}

/// The actor behind an optional session.
pub fn actor_of(session: Option<&Session>) -> Option<&str> {
    session.map(Session::actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraffitiResult;
    use crate::http::{HttpRequest, HttpResponse};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl HttpClient for Unreachable {
        async fn send(&self, _request: HttpRequest) -> GraffitiResult<HttpResponse> {
            Err(crate::GraffitiError::Transport("unreachable".into()))
        }
    }

    #[test]
    fn local_session_has_no_capability() {
        let s = Session::local("alice");
        assert_eq!(s.actor(), "alice");
        assert!(!s.is_remote());
        assert!(s.http().is_none());
        assert!(Session::remote_only(Some(&s)).is_none());
    }

    #[test]
    fn remote_session() {
        let s = Session::remote("https://alice.example", Arc::new(Unreachable));
        assert!(s.is_remote());
        assert!(s.http().is_some());
        assert_eq!(actor_of(Some(&s)), Some("https://alice.example"));
        assert!(Session::remote_only(Some(&s)).is_some());
        assert!(format!("{s:?}").contains("alice"));
    }
}
