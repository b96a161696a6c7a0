//! Reorder requests: staff asks a supplier to replenish a product.
//!
//! The request is an event-sourced aggregate with a forward-only status
//! lifecycle and an append-only timeline. Every permission decision goes
//! through `stockroom_auth::authorize`.

pub mod request;
pub mod status;
pub mod timeline;

pub use request::{
    AddReorderNote, CreateReorderRequest, ReorderCommand, ReorderEvent, ReorderNoteAdded,
    ReorderRequest, ReorderRequestId, ReorderRequested, ReorderStatusChanged, SupplierEstimate,
    SupplierResponse, UpdateReorderStatus,
};
pub use status::{ReorderStatus, Urgency};
pub use timeline::{Note, TimelineAction, TimelineEntry};
