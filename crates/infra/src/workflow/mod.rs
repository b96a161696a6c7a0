//! Cross-aggregate workflows driven by committed events.

pub mod restock;

pub use restock::{Delivery, RestockWorkflow};
