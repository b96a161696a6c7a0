//! Application services: the entry points callers use.
//!
//! Each service turns a request into an aggregate command, runs it through
//! the [`CommandDispatcher`](crate::command_dispatcher::CommandDispatcher) and
//! fires notifications once the change has committed.

pub mod ledger;
pub mod parties;
pub mod reorder;
pub mod stock;

pub use ledger::{MovementLedger, MovementPage, MovementStats, Pagination};
pub use parties::PartyService;
pub use reorder::{NewReorder, ReorderService, StatusUpdate};
pub use stock::{
    AdjustStock, AdjustmentOutcome, BulkAdjustmentReport, BulkFailure, NewProduct,
    StockAdjustmentService, StockOutcome,
};
