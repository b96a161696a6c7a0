//! Rebuilding and catching up read models.

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use stockroom_events::{EventEnvelope, Subscription};

use super::{Projection, ProjectionError};
use crate::event_store::{EventStore, EventStoreError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("projection '{projection}' failed: {source}")]
    Projection {
        projection: &'static str,
        #[source]
        source: ProjectionError,
    },
}

/// Reset `projection` and replay every stored event of its aggregate type.
///
/// Returns the number of envelopes applied.
pub fn rebuild<P, S>(projection: &P, store: &S) -> Result<usize, ReplayError>
where
    P: Projection + ?Sized,
    S: EventStore + ?Sized,
{
    let events = store.load_all(projection.aggregate_type())?;
    projection.reset();

    for stored in &events {
        projection
            .apply_envelope(&stored.to_envelope())
            .map_err(|source| ReplayError::Projection {
                projection: projection.name(),
                source,
            })?;
    }

    info!(projection = projection.name(), events = events.len(), "projection rebuilt");
    Ok(events.len())
}

/// Apply everything queued on `subscription` without blocking.
///
/// Failures are logged and skipped; a projection that falls behind can be
/// repaired with [`rebuild`].
pub fn catch_up<P>(projection: &P, subscription: &Subscription<EventEnvelope<JsonValue>>) -> usize
where
    P: Projection + ?Sized,
{
    let mut applied = 0;
    for envelope in subscription.drain() {
        match projection.apply_envelope(&envelope) {
            Ok(()) => applied += 1,
            Err(err) => warn!(
                projection = projection.name(),
                event_id = %envelope.event_id(),
                error = %err,
                "failed to apply envelope"
            ),
        }
    }
    applied
}
