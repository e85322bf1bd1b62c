//! Reference Graffiti origin server.
//!
//! Serves the origin wire protocol over a [`graffiti_store::MemoryStore`]:
//! single objects at `/{name}`, server-assigned creation at `/create`, and
//! the streamed `/discover`, `/recover-orphans`, `/continue` and
//! `/channel-stats` endpoints. Requests identify their actor with
//! `Authorization: Bearer <percent-encoded actor>`.
//!
//! [`InProcessClient`] drives the router without sockets.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod query;
pub mod router;
pub mod server;

pub use auth::Credentials;
pub use client::InProcessClient;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::GraffitiServer;
