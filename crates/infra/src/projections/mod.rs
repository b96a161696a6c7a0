//! Read model builders fed from published envelopes.
//!
//! All projections are:
//! - **Rebuildable**: reconstructed from the event store with [`replay::rebuild`]
//! - **Idempotent**: a per-stream cursor drops redelivered envelopes
//! - **Selective**: envelopes of other aggregate types are ignored

pub mod cursor;
pub mod reorders;
pub mod replay;
pub mod stock_levels;

use serde_json::Value as JsonValue;
use thiserror::Error;

use stockroom_events::EventEnvelope;

pub use cursor::StreamCursors;
pub use reorders::{ReorderFilter, ReorderProjection, ReorderSummary};
pub use replay::{ReplayError, catch_up, rebuild};
pub use stock_levels::{StockLevel, StockLevelsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: &'static str,
        message: String,
    },

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("envelope does not match its payload: {0}")]
    Mismatch(String),

    /// A writer panicked mid-update; the projection needs a rebuild.
    #[error("{0} state lock poisoned")]
    Poisoned(&'static str),
}

/// A read model that folds committed envelopes.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Aggregate type whose envelopes this projection consumes.
    fn aggregate_type(&self) -> &'static str;

    /// Apply one envelope. Must be idempotent for redelivery.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state and cursors.
    fn reset(&self);
}
