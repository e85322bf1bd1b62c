//! Client for a single remote Graffiti origin.
//!
//! [`RemoteStore`] implements the store contract by talking HTTP to one
//! origin. Single-object responses are decoded from the body plus headers;
//! discovery and continuation responses are read as JSON lines, one entry
//! at a time, and every entry is checked by an [`EntryPipeline`] before it
//! reaches the caller.
//!
//! # Key Types
//!
//! - [`RemoteStore`] -- the origin client
//! - [`EntryPipeline`] / [`EntryStage`] -- ordered per-entry checks
//! - [`LiveObjects`] -- drops tombstones from discovery results

pub mod pipeline;
pub mod store;
pub mod stream;

pub use pipeline::{
    AccessStage, Desired, DesiredStage, EntryPipeline, EntryStage, OriginStage, SchemaStage,
};
pub use store::RemoteStore;
pub use stream::LiveObjects;
