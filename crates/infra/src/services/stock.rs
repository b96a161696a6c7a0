//! Stock Adjustment Service: the only writer of stock records.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{info, instrument};
use uuid::Uuid;

use stockroom_core::{DomainError, DomainResult, ErrorKind, UserId};
use stockroom_events::{EventBus, EventEnvelope};
use stockroom_inventory::{
    InventoryCommand, InventoryEvent, MovementReason, MovementRecord, MovementType, ProductId,
    ReconcileCount, RecordMovement, RegisterProduct, ReleaseReservation, ReserveStock,
    SetLowStockThreshold, SetTrackInventory, StockItem, StockRecord, StockStatus,
    StockStatusChanged,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;
use crate::notifications::{
    Notification, NotificationDispatcher, NotificationKind, Recipient, notify_best_effort,
};
use crate::streams;

/// One stock adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: MovementReason,
    /// Minor currency units per item; 0 when unknown.
    pub unit_cost: i64,
    pub notes: Option<String>,
    pub reference: Option<String>,
    pub actor: UserId,
}

impl AdjustStock {
    pub fn new(
        product_id: ProductId,
        movement_type: MovementType,
        quantity: i64,
        reason: MovementReason,
        actor: UserId,
    ) -> Self {
        Self {
            product_id,
            movement_type,
            quantity,
            reason,
            unit_cost: 0,
            notes: None,
            reference: None,
            actor,
        }
    }

    /// Build from wire strings; unknown types and blank or unknown reasons
    /// are `InvalidInput`.
    pub fn parse(
        product_id: ProductId,
        movement_type: &str,
        quantity: i64,
        reason: &str,
        actor: UserId,
    ) -> DomainResult<Self> {
        Ok(Self::new(
            product_id,
            movement_type.parse()?,
            quantity,
            reason.parse()?,
            actor,
        ))
    }

    pub fn with_unit_cost(mut self, unit_cost: i64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A committed adjustment: the new record and the ledger row that explains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub record: StockRecord,
    pub status: StockStatus,
    pub movement: MovementRecord,
    /// Present when the derived status changed, e.g. `available` hit zero.
    pub status_change: Option<StockStatusChanged>,
}

/// Result of a non-movement stock operation (reserve, release, settings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOutcome {
    pub record: StockRecord,
    pub status: StockStatus,
    /// The movement written, if any.
    pub movement: Option<MovementRecord>,
    pub status_change: Option<StockStatusChanged>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub index: usize,
    pub product_id: ProductId,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAdjustmentReport {
    pub succeeded: Vec<AdjustmentOutcome>,
    pub failed: Vec<BulkFailure>,
}

/// New product's stock side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub initial_stock: i64,
    pub low_stock_threshold: i64,
    pub track_inventory: bool,
}

pub struct StockAdjustmentService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl<S, B> StockAdjustmentService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher, notifier }
    }

    #[instrument(skip(self))]
    pub fn register_product(&self, product: NewProduct, actor: UserId) -> Result<StockOutcome, DispatchError> {
        let cmd = InventoryCommand::RegisterProduct(RegisterProduct {
            product_id: product.product_id,
            sku: product.sku,
            name: product.name,
            initial_stock: product.initial_stock,
            low_stock_threshold: product.low_stock_threshold,
            track_inventory: product.track_inventory,
            initial_movement_id: Uuid::now_v7(),
            actor,
            occurred_at: Utc::now(),
        });
        let out = self.run(product.product_id, &cmd)?;
        info!(product_id = %product.product_id, current = out.record.current(), "product registered");
        Ok(out)
    }

    /// Apply one movement. Nothing is written on failure.
    #[instrument(skip(self))]
    pub fn adjust(&self, request: AdjustStock) -> Result<AdjustmentOutcome, DispatchError> {
        let cmd = InventoryCommand::RecordMovement(RecordMovement {
            product_id: request.product_id,
            movement_id: Uuid::now_v7(),
            movement_type: request.movement_type,
            quantity: request.quantity,
            reason: request.reason,
            unit_cost: request.unit_cost,
            notes: request.notes,
            reference: request.reference,
            actor: request.actor,
            occurred_at: Utc::now(),
        });

        let out = self.run(request.product_id, &cmd)?;
        let movement = out
            .movement
            .ok_or_else(|| DomainError::invariant("adjustment committed without a movement"))?;

        info!(
            product_id = %request.product_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity,
            previous_stock = movement.previous_stock,
            new_stock = movement.new_stock,
            "stock adjusted"
        );

        Ok(AdjustmentOutcome {
            record: out.record,
            status: out.status,
            movement,
            status_change: out.status_change,
        })
    }

    /// Each item is processed on its own; one failure does not stop the rest.
    #[instrument(skip(self, requests), fields(items = requests.len()))]
    pub fn adjust_bulk(&self, requests: Vec<AdjustStock>) -> BulkAdjustmentReport {
        let mut report = BulkAdjustmentReport::default();

        for (index, request) in requests.into_iter().enumerate() {
            let product_id = request.product_id;
            match self.adjust(request) {
                Ok(outcome) => report.succeeded.push(outcome),
                Err(err) => report.failed.push(BulkFailure {
                    index,
                    product_id,
                    kind: err.kind(),
                    message: err.public_message(),
                }),
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk adjustment finished"
        );
        report
    }

    #[instrument(skip(self))]
    pub fn reserve(&self, product_id: ProductId, quantity: i64, actor: UserId) -> Result<StockOutcome, DispatchError> {
        self.run(
            product_id,
            &InventoryCommand::ReserveStock(ReserveStock {
                product_id,
                quantity,
                actor,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self))]
    pub fn release(&self, product_id: ProductId, quantity: i64, actor: UserId) -> Result<StockOutcome, DispatchError> {
        self.run(
            product_id,
            &InventoryCommand::ReleaseReservation(ReleaseReservation {
                product_id,
                quantity,
                actor,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Set on-hand stock to a physically counted value.
    ///
    /// The difference is recorded as an adjustment with reason
    /// `inventory_count`; `movement` is `None` when the count already matched.
    #[instrument(skip(self))]
    pub fn reconcile_count(
        &self,
        product_id: ProductId,
        counted: i64,
        notes: Option<String>,
        actor: UserId,
    ) -> Result<StockOutcome, DispatchError> {
        self.run(
            product_id,
            &InventoryCommand::ReconcileCount(ReconcileCount {
                product_id,
                movement_id: Uuid::now_v7(),
                counted,
                notes,
                actor,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self))]
    pub fn set_low_stock_threshold(&self, product_id: ProductId, threshold: i64) -> Result<StockOutcome, DispatchError> {
        self.run(
            product_id,
            &InventoryCommand::SetLowStockThreshold(SetLowStockThreshold {
                product_id,
                threshold,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self))]
    pub fn set_track_inventory(&self, product_id: ProductId, track_inventory: bool) -> Result<StockOutcome, DispatchError> {
        self.run(
            product_id,
            &InventoryCommand::SetTrackInventory(SetTrackInventory {
                product_id,
                track_inventory,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Current stock item (record, SKU, name). `NotFound` for unknown products.
    pub fn stock(&self, product_id: ProductId) -> Result<StockItem, DispatchError> {
        let item = self.load(product_id)?;
        if !item.is_registered() {
            return Err(DomainError::not_found(format!("product {product_id}")).into());
        }
        Ok(item)
    }

    pub(crate) fn load(&self, product_id: ProductId) -> Result<StockItem, DispatchError> {
        self.dispatcher.load(product_id.0, streams::STOCK_ITEM, |id| {
            StockItem::empty(ProductId::new(id))
        })
    }

    fn run(&self, product_id: ProductId, cmd: &InventoryCommand) -> Result<StockOutcome, DispatchError> {
        let Dispatched { aggregate, events, .. } = self.dispatcher.dispatch(
            product_id.0,
            streams::STOCK_ITEM,
            cmd,
            |id| StockItem::empty(ProductId::new(id)),
        )?;

        let mut movement = None;
        let mut status_change = None;
        for ev in events {
            match ev {
                InventoryEvent::StockMoved(e) => movement = Some(e.movement),
                InventoryEvent::StockStatusChanged(e) => status_change = Some(e),
                _ => {}
            }
        }

        if let Some(change) = &status_change {
            info!(
                %product_id,
                from = %change.from,
                to = %change.to,
                available = change.available,
                "stock status changed"
            );
            notify_best_effort(
                self.notifier.as_ref(),
                Notification {
                    kind: NotificationKind::StockStatusChanged,
                    recipient: Recipient::Staff,
                    subject: product_id.0,
                    payload: json!({
                        "sku": aggregate.sku(),
                        "from": change.from,
                        "to": change.to,
                        "available": change.available,
                    }),
                    occurred_at: change.occurred_at,
                },
            );
        }

        Ok(StockOutcome {
            record: *aggregate.stock(),
            status: aggregate.status(),
            movement,
            status_change,
        })
    }
}
