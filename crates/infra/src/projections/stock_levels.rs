use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use stockroom_events::EventEnvelope;
use stockroom_inventory::{InventoryEvent, ProductId, StockStatus};

use super::{Projection, ProjectionError, StreamCursors};
use crate::read_model::ReadStore;
use crate::streams;

/// Current stock figures for one product, as the catalog sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub current: i64,
    pub reserved: i64,
    pub available: i64,
    pub low_stock_threshold: i64,
    pub track_inventory: bool,
    pub status: StockStatus,
    pub last_movement_at: Option<DateTime<Utc>>,
}

impl StockLevel {
    fn recompute(&mut self) {
        self.available = self.current - self.reserved;
        self.status = StockStatus::derive(self.available, self.low_stock_threshold, self.track_inventory);
    }
}

/// Stock levels projection over `StockItem` streams.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadStore<ProductId, StockLevel>,
{
    store: S,
    cursors: RwLock<StreamCursors>,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadStore<ProductId, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(StreamCursors::new()),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<StockLevel> {
        self.store.get(product_id)
    }

    /// All products ordered by SKU.
    pub fn list(&self) -> Vec<StockLevel> {
        let mut levels = self.store.list();
        levels.sort_by(|a, b| a.sku.cmp(&b.sku));
        levels
    }

    pub fn low_stock(&self) -> Vec<StockLevel> {
        self.with_status(StockStatus::LowStock)
    }

    pub fn out_of_stock(&self) -> Vec<StockLevel> {
        self.with_status(StockStatus::OutOfStock)
    }

    fn with_status(&self, status: StockStatus) -> Vec<StockLevel> {
        self.list().into_iter().filter(|l| l.status == status).collect()
    }

    fn fold(&self, event: InventoryEvent) -> Result<(), ProjectionError> {
        let product_id = event.product_id();

        if let InventoryEvent::ProductRegistered(e) = &event {
            let mut level = StockLevel {
                product_id,
                sku: e.sku.clone(),
                name: e.name.clone(),
                current: 0,
                reserved: 0,
                available: 0,
                low_stock_threshold: e.low_stock_threshold,
                track_inventory: e.track_inventory,
                status: StockStatus::InStock,
                last_movement_at: None,
            };
            level.recompute();
            self.store.upsert(product_id, level);
            return Ok(());
        }

        let mut level = self.store.get(&product_id).ok_or_else(|| {
            ProjectionError::Mismatch(format!("stock event for unregistered product {product_id}"))
        })?;

        match event {
            InventoryEvent::ProductRegistered(_) => {}
            InventoryEvent::StockMoved(e) => {
                level.current = e.movement.new_stock;
                level.last_movement_at = Some(e.movement.movement_date);
            }
            InventoryEvent::StockReserved(e) => level.reserved = e.reserved_after,
            InventoryEvent::ReservationReleased(e) => level.reserved = e.reserved_after,
            InventoryEvent::LowStockThresholdChanged(e) => level.low_stock_threshold = e.threshold,
            InventoryEvent::TrackingChanged(e) => level.track_inventory = e.track_inventory,
            InventoryEvent::StockStatusChanged(_) => {}
        }

        level.recompute();
        self.store.upsert(product_id, level);
        Ok(())
    }
}

impl<S> Projection for StockLevelsProjection<S>
where
    S: ReadStore<ProductId, StockLevel>,
{
    fn name(&self) -> &'static str {
        "stock_levels"
    }

    fn aggregate_type(&self) -> &'static str {
        streams::STOCK_ITEM
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::STOCK_ITEM {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut cursors = self
            .cursors
            .write()
            .map_err(|_| ProjectionError::Poisoned(self.name()))?;
        if !cursors.should_apply(aggregate_id, seq)? {
            debug!(%aggregate_id, seq, "duplicate stock envelope ignored");
            return Ok(());
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone()).map_err(|e| {
            ProjectionError::Deserialize {
                aggregate_type: streams::STOCK_ITEM,
                message: e.to_string(),
            }
        })?;
        if event.product_id().0 != aggregate_id {
            return Err(ProjectionError::Mismatch(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        self.fold(event)?;
        cursors.advance(aggregate_id, seq);
        Ok(())
    }

    fn reset(&self) {
        // Cursors are rebuilt from scratch, so a poisoned lock is recovered here.
        self.cursors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.cursors.clear_poison();
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockroom_core::{AggregateId, UserId};
    use stockroom_events::InMemoryEventBus;
    use stockroom_inventory::{MovementReason, MovementType};

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::{EventStore, InMemoryEventStore};
    use crate::notifications::TracingNotifier;
    use crate::projections::rebuild;
    use crate::read_model::InMemoryReadStore;
    use crate::services::{AdjustStock, NewProduct, StockAdjustmentService};

    type Store = Arc<InMemoryEventStore>;
    type Levels = InMemoryReadStore<ProductId, StockLevel>;

    /// Registered with 10, then two sales of 1: four envelopes, current 8.
    fn history() -> (Store, ProductId, Vec<EventEnvelope<JsonValue>>) {
        let store: Store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::new());
        let stock = StockAdjustmentService::new(
            Arc::new(CommandDispatcher::new(store.clone(), bus)),
            Arc::new(TracingNotifier),
        );

        let product_id = ProductId::new(AggregateId::new());
        stock
            .register_product(
                NewProduct {
                    product_id,
                    sku: "GAP-1".to_string(),
                    name: "Washer".to_string(),
                    initial_stock: 10,
                    low_stock_threshold: 2,
                    track_inventory: true,
                },
                UserId::new(),
            )
            .unwrap();
        for _ in 0..2 {
            stock
                .adjust(AdjustStock::new(
                    product_id,
                    MovementType::Sale,
                    1,
                    MovementReason::StockSold,
                    UserId::new(),
                ))
                .unwrap();
        }

        let envelopes = store
            .load_stream(product_id.0)
            .unwrap()
            .iter()
            .map(|e| e.to_envelope())
            .collect();
        (store, product_id, envelopes)
    }

    #[test]
    fn early_envelope_is_refused_until_the_gap_is_filled() {
        let (_, product_id, envelopes) = history();
        let levels = StockLevelsProjection::new(Levels::new());

        levels.apply_envelope(&envelopes[0]).unwrap();
        levels.apply_envelope(&envelopes[1]).unwrap();
        assert!(matches!(
            levels.apply_envelope(&envelopes[3]),
            Err(ProjectionError::NonMonotonicSequence { last: 2, found: 4 })
        ));

        levels.apply_envelope(&envelopes[2]).unwrap();
        assert_eq!(levels.get(&product_id).unwrap().current, 9);

        levels.apply_envelope(&envelopes[3]).unwrap();
        levels.apply_envelope(&envelopes[3]).unwrap();
        assert_eq!(levels.get(&product_id).unwrap().current, 8);
    }

    #[test]
    fn poisoned_cursors_fail_loudly_until_rebuilt() {
        let (store, product_id, envelopes) = history();
        let levels = StockLevelsProjection::new(Levels::new());

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = levels.cursors.write().unwrap();
            panic!("writer died mid-update");
        }));

        assert!(matches!(
            levels.apply_envelope(&envelopes[0]),
            Err(ProjectionError::Poisoned("stock_levels"))
        ));

        assert_eq!(rebuild(&levels, &store).unwrap(), 4);
        assert_eq!(levels.get(&product_id).unwrap().current, 8);
    }
}
