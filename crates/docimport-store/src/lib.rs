//! Collection Store boundary
//!
//! The import pipeline talks to a schema-enforcing document store through
//! [`CollectionStore`]. Failures carry a structured [`ErrorKind`] so callers
//! decide on retries by kind, never by message text.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: collections held in memory, used by tests and dry runs
//! - [`DirStore`]: the same catalog persisted under a local directory

mod context;
mod dir;
mod error;
mod memory;
mod validate;

pub use context::{CallContext, CancelToken};
pub use dir::DirStore;
pub use error::{ErrorKind, SizeLimit, StoreError};
pub use memory::{MemoryStore, StoreLimits, StoreStats};
pub use validate::check_schema_update;

use docimport_schema::RawDocument;

/// Write API of a schema-bound collection store
///
/// Every call blocks until done and honours the deadline and cancellation
/// state of `ctx`.
pub trait CollectionStore {
    /// Insert all documents or none
    fn insert(&mut self, ctx: &CallContext, collection: &str, documents: &[RawDocument]) -> Result<(), StoreError>;

    /// Create the collection or replace its schema with a compatible one
    fn create_or_update_collection(&mut self, ctx: &CallContext, collection: &str, schema: &str)
        -> Result<(), StoreError>;

    /// Schema of an existing collection in wire format
    fn describe_collection(&self, ctx: &CallContext, collection: &str) -> Result<String, StoreError>;
}
