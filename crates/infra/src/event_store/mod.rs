//! Append-only event store boundary.
//!
//! Every aggregate (product stock, party, reorder request) is one stream keyed
//! by its id. Appends are atomic per batch and guarded by `ExpectedVersion`.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
