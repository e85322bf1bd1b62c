//! Federation of Graffiti stores.
//!
//! [`RemoteRouter`] spreads the store contract across many origins, sending
//! each call to the origin its url names and draining federation-wide
//! streams one origin at a time. [`RemoteAndLocal`] puts a local store and a
//! remote federation behind one store, choosing between them by url scheme
//! and by session.
//!
//! # Key Types
//!
//! - [`RemoteRouter`] -- origin registry and sequential federation
//! - [`RemoteAndLocal`] / [`MergedStream`] -- local-then-remote merge
//! - [`FederationConfig`] -- registry and default origin, loadable from TOML

pub mod config;
pub mod merge;
pub mod router;
pub mod stream;

pub use config::{ConfigError, ConfigResult, FederationConfig};
pub use merge::{Leg, MergedStream, RemoteAndLocal, LOCAL_LEG, REMOTE_LEG};
pub use router::RemoteRouter;
pub use stream::{LegOpener, MapReturn, Outcomes, PendingLeg, Sequential};
