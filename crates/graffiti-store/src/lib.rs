//! The Graffiti store contract and its in-memory implementation.
//!
//! Every store, local or remote, single-origin or federated, implements
//! [`GraffitiStore`]. This crate also carries the pieces every
//! implementation shares:
//!
//! - [`SchemaCache`]: memoized JSON-schema compilation
//! - [`mask_object`]: the view of an object a non-owner may see
//! - [`MemoryStore`]: a `HashMap`-backed store for `local:` urls and for the
//!   reference origin server
//!
//! # Design Rules
//!
//! 1. `last_modified` strictly increases across writes within one store.
//! 2. Deletions leave tombstones; continued streams report them.
//! 3. Visibility is checked before schema validation, so a schema can never
//!    be used to detect objects the requester cannot see.

pub mod access;
pub mod memory;
pub mod schema;
pub mod traits;

pub use access::mask_object;
pub use memory::MemoryStore;
pub use schema::{check_schema, SchemaCache};
pub use traits::GraffitiStore;
