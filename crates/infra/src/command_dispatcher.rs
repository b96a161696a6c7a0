//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream
//!   ↓
//! 2. Rehydrate (apply history)
//!   ↓
//! 3. handle(command) → events (pure)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓   └─ stale version → back to 1, up to `max_attempts`
//! 5. Publish committed events in stream order (best effort)
//! ```
//!
//! Step 4 is what keeps concurrent stock adjustments from losing updates: two
//! decisions taken from the same version cannot both commit, and the loser
//! re-decides against the winner's state.
//!
//! Step 5 runs under a per-dispatcher lock that remembers the last published
//! position of every stream. Two writers that commit N and N+1 may reach it in
//! either order; whichever arrives first publishes everything up to its own
//! commit, so consumers always see a stream without gaps.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use stockroom_core::{Aggregate, AggregateId, DomainError, ErrorKind, ExpectedVersion};
use stockroom_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic business failure from `handle`.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Every attempt lost the race for the stream.
    #[error("conflicting concurrent update after {attempts} attempt(s): {message}")]
    Concurrency { attempts: u32, message: String },

    /// A stored payload no longer matches the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(message) => DispatchError::Concurrency {
                attempts: 1,
                message,
            },
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Domain(e) => e.kind(),
            DispatchError::Concurrency { .. } => ErrorKind::Conflict,
            DispatchError::Deserialize(_) | DispatchError::Store(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Message safe to show a caller. Storage detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::Domain(e) => e.to_string(),
            DispatchError::Concurrency { .. } => {
                "the record was changed by another request; retry".to_string()
            }
            DispatchError::Deserialize(_) | DispatchError::Store(_) => {
                "internal storage error".to_string()
            }
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of a committed (or no-op) command.
#[derive(Debug)]
pub struct Dispatched<A: Aggregate> {
    /// Aggregate state after the committed events.
    pub aggregate: A,
    /// Domain events decided by `handle`; empty for a no-op.
    pub events: Vec<A::Event>,
    pub committed: Vec<StoredEvent>,
    /// 1 unless a concurrent writer forced a retry.
    pub attempts: u32,
}

/// Reusable command execution engine.
///
/// `S` is the event store and `B` the bus committed envelopes are published
/// on. Both are traits so tests run against the in-memory implementations.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    max_attempts: u32,
    /// Last sequence number handed to the bus, per stream.
    published: Mutex<HashMap<AggregateId, u64>>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            published: Mutex::new(HashMap::new()),
        }
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate stored under `aggregate_id`.
    ///
    /// Domain errors are returned on the first attempt that produces them;
    /// only stale-version appends are retried.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockroom_events::Event + Serialize + DeserializeOwned,
    {
        let mut last_conflict = String::new();

        for attempt in 1..=self.max_attempts {
            let mut aggregate = self.load(aggregate_id, aggregate_type, &make_aggregate)?;
            let expected = ExpectedVersion::Exact(aggregate.version());

            let decided = aggregate.handle(command)?;
            if decided.is_empty() {
                return Ok(Dispatched {
                    aggregate,
                    events: decided,
                    committed: vec![],
                    attempts: attempt,
                });
            }

            let uncommitted = decided
                .iter()
                .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
                .collect::<Result<Vec<_>, _>>()?;

            match self.store.append(uncommitted, expected) {
                Ok(committed) => {
                    for ev in &decided {
                        aggregate.apply(ev);
                    }
                    self.publish(aggregate_id, &committed);
                    return Ok(Dispatched {
                        aggregate,
                        events: decided,
                        committed,
                        attempts: attempt,
                    });
                }
                Err(EventStoreError::Concurrency(message)) => {
                    debug!(%aggregate_id, aggregate_type, attempt, "stale stream version, retrying");
                    last_conflict = message;
                }
                Err(other) => return Err(DispatchError::Store(other)),
            }
        }

        warn!(
            %aggregate_id,
            aggregate_type,
            attempts = self.max_attempts,
            "giving up after repeated concurrent updates"
        );
        Err(DispatchError::Concurrency {
            attempts: self.max_attempts,
            message: last_conflict,
        })
    }

    /// Rehydrate an aggregate without running a command.
    ///
    /// An id whose stream belongs to another aggregate type is `NotFound`:
    /// there is no `aggregate_type` with that id.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        if let Some(first) = history.first() {
            if first.aggregate_type != aggregate_type {
                debug!(
                    %aggregate_id,
                    expected = aggregate_type,
                    found = %first.aggregate_type,
                    "id belongs to another aggregate type"
                );
                return Err(DomainError::not_found(format!("{aggregate_type} {aggregate_id}")).into());
            }
        }
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Publication happens after the append has committed; a failure here
    /// cannot undo it, so it is logged and swallowed. Read models recover by
    /// rebuilding from the store.
    ///
    /// Events are published in stream order. When a concurrent writer's
    /// earlier commit has not been published yet, it is read back from the
    /// store and published first; the slower writer then finds nothing left.
    fn publish(&self, aggregate_id: AggregateId, committed: &[StoredEvent]) {
        let Some(top) = committed.last().map(|e| e.sequence_number) else {
            return;
        };
        // The map only holds positions that were already published, so it
        // stays valid even if another publisher panicked.
        let mut published = self
            .published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let last = published.get(&aggregate_id).copied().unwrap_or(0);
        if top <= last {
            return;
        }

        let contiguous = committed
            .first()
            .is_some_and(|e| e.sequence_number == last + 1);
        let pending = if contiguous {
            committed.to_vec()
        } else {
            match self.store.load_stream(aggregate_id) {
                Ok(stream) => stream
                    .into_iter()
                    .filter(|e| e.sequence_number > last && e.sequence_number <= top)
                    .collect(),
                Err(err) => {
                    warn!(%aggregate_id, error = %err, "could not read back unpublished events");
                    committed.to_vec()
                }
            }
        };

        for stored in &pending {
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                warn!(
                    event_id = %stored.event_id,
                    event_type = %stored.event_type,
                    error = ?err,
                    "failed to publish committed event"
                );
            }
        }
        published.insert(aggregate_id, top);
    }
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use stockroom_core::{AggregateRoot, UserId};
    use stockroom_events::InMemoryEventBus;
    use stockroom_inventory::{
        InventoryCommand, MovementReason, MovementType, ProductId, RecordMovement, RegisterProduct,
        StockItem,
    };

    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>, Bus> {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn register(product_id: ProductId, initial_stock: i64) -> InventoryCommand {
        InventoryCommand::RegisterProduct(RegisterProduct {
            product_id,
            sku: "SKU-9".to_string(),
            name: "Gasket".to_string(),
            initial_stock,
            low_stock_threshold: 0,
            track_inventory: true,
            initial_movement_id: Uuid::now_v7(),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn sale(product_id: ProductId, quantity: i64) -> InventoryCommand {
        InventoryCommand::RecordMovement(RecordMovement {
            product_id,
            movement_id: Uuid::now_v7(),
            movement_type: MovementType::Sale,
            quantity,
            reason: MovementReason::StockSold,
            unit_cost: 0,
            notes: None,
            reference: None,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_appends_then_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let product_id = ProductId::new(AggregateId::new());

        let out = d
            .dispatch(product_id.0, "inventory.stock_item", &register(product_id, 5), |id| {
                StockItem::empty(ProductId::new(id))
            })
            .unwrap();

        assert_eq!(out.attempts, 1);
        assert_eq!(out.committed.len(), 2);
        assert_eq!(out.aggregate.version(), 2);
        let published = sub.drain();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].event_type(), "inventory.stock.moved");
    }

    #[test]
    fn domain_errors_write_nothing() {
        let d = dispatcher();
        let product_id = ProductId::new(AggregateId::new());
        let make = |id| StockItem::empty(ProductId::new(id));
        d.dispatch(product_id.0, "inventory.stock_item", &register(product_id, 2), make)
            .unwrap();

        let err = d
            .dispatch(product_id.0, "inventory.stock_item", &sale(product_id, 3), make)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(d.store().load_stream(product_id.0).unwrap().len(), 2);
    }

    #[test]
    fn racing_writers_publish_each_stream_in_order() {
        let d = Arc::new(dispatcher());
        let sub = d.bus().subscribe();
        let product_id = ProductId::new(AggregateId::new());
        let make = |id| StockItem::empty(ProductId::new(id));
        d.dispatch(product_id.0, "inventory.stock_item", &register(product_id, 1_000), make)
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = d.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        d.dispatch(product_id.0, "inventory.stock_item", &sale(product_id, 1), make)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let seqs: Vec<u64> = sub.drain().iter().map(|env| env.sequence_number()).collect();
        let expected: Vec<u64> = (1..=202).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn ids_of_another_aggregate_type_are_not_found() {
        let d = dispatcher();
        let product_id = ProductId::new(AggregateId::new());
        let make = |id| StockItem::empty(ProductId::new(id));
        d.dispatch(product_id.0, "inventory.stock_item", &register(product_id, 2), make)
            .unwrap();

        let err = d.load(product_id.0, "parties.party", make).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = d
            .dispatch(product_id.0, "reorder.request", &sale(product_id, 1), make)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(d.store().load_stream(product_id.0).unwrap().len(), 2);
    }

    #[test]
    fn storage_errors_do_not_leak_detail() {
        let err = DispatchError::Store(EventStoreError::Unavailable("pg: socket closed".to_string()));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(err.http_status(), 500);
        assert!(!err.public_message().contains("socket"));
    }

    #[test]
    fn concurrency_maps_to_retryable_conflict() {
        let err: DispatchError = EventStoreError::Concurrency("expected 1, found 2".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.kind().is_retryable());
    }
}
