//! Infrastructure layer: event store, dispatcher, services, read models.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod notifications;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod workers;
pub mod workflow;


/// Aggregate type names stamped on stored events and envelopes.
pub mod streams {
    pub const STOCK_ITEM: &str = "inventory.stock_item";
    pub const PARTY: &str = "parties.party";
    pub const REORDER_REQUEST: &str = "reorder.request";
}
