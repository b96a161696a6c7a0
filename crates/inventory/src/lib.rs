//! Inventory domain module (event-sourced stock ledger).
//!
//! Per-product stock state, the immutable movement records that explain every
//! change to it, and the read-side filters/rollups over those records. Pure
//! deterministic domain logic: no IO, no HTTP, no storage.

pub mod item;
pub mod movement;
pub mod query;
pub mod stock;

pub use item::{
    InventoryCommand, InventoryEvent, LowStockThresholdChanged, ProductId, ProductRegistered,
    ReconcileCount, RecordMovement, RegisterProduct, ReleaseReservation, ReservationReleased,
    ReserveStock, SetLowStockThreshold, SetTrackInventory, StockItem, StockMoved, StockReserved,
    StockStatusChanged, TrackingChanged,
};
pub use movement::{MovementDirection, MovementReason, MovementRecord, MovementType};
pub use query::{MovementFilter, MovementTypeStats, summarize};
pub use stock::{StockRecord, StockStatus};
