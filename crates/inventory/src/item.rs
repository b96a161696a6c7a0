use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use stockroom_events::Event;

use crate::movement::{MovementReason, MovementRecord, MovementType};
use crate::stock::{StockRecord, StockStatus};

/// Product identifier; one stock stream per product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: the stock side of a product.
///
/// The event stream of this aggregate *is* the movement ledger: every change
/// to `current` is a `StockMoved` event carrying its `MovementRecord`, so the
/// record and its ledger row can only be committed together.
///
/// A movement `reference` names an external document (delivery, order,
/// count sheet) and is booked at most once per product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: ProductId,
    sku: String,
    name: String,
    stock: StockRecord,
    movement_count: u64,
    references: BTreeSet<String>,
    version: u64,
    created: bool,
}

impl StockItem {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            sku: String::new(),
            name: String::new(),
            stock: StockRecord::default(),
            movement_count: 0,
            references: BTreeSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> &StockRecord {
        &self.stock
    }

    pub fn status(&self) -> StockStatus {
        self.stock.status()
    }

    pub fn movement_count(&self) -> u64 {
        self.movement_count
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    pub fn has_reference(&self, reference: &str) -> bool {
        self.references.contains(reference.trim())
    }
}

impl AggregateRoot for StockItem {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterProduct.
///
/// A positive `initial_stock` is recorded as an `initial_stock` movement
/// with id `initial_movement_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub initial_stock: i64,
    pub low_stock_threshold: i64,
    pub track_inventory: bool,
    pub initial_movement_id: Uuid,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMovement (the stock adjustment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub product_id: ProductId,
    pub movement_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: MovementReason,
    pub unit_cost: i64,
    pub notes: Option<String>,
    pub reference: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseReservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub product_id: ProductId,
    pub quantity: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReconcileCount.
///
/// Sets on-hand stock to a physically counted value by recording the
/// difference as an adjustment movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCount {
    pub product_id: ProductId,
    pub movement_id: Uuid,
    pub counted: i64,
    pub notes: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetLowStockThreshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLowStockThreshold {
    pub product_id: ProductId,
    pub threshold: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetTrackInventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTrackInventory {
    pub product_id: ProductId,
    pub track_inventory: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    RegisterProduct(RegisterProduct),
    RecordMovement(RecordMovement),
    ReserveStock(ReserveStock),
    ReleaseReservation(ReleaseReservation),
    ReconcileCount(ReconcileCount),
    SetLowStockThreshold(SetLowStockThreshold),
    SetTrackInventory(SetTrackInventory),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub low_stock_threshold: i64,
    pub track_inventory: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved (one ledger row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub movement: MovementRecord,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved_after: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved_after: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LowStockThresholdChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockThresholdChanged {
    pub product_id: ProductId,
    pub threshold: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TrackingChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingChanged {
    pub product_id: ProductId,
    pub track_inventory: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockStatusChanged.
///
/// Appended in the same batch as the change that caused it, so catalog
/// consumers see out-of-stock and back-in-stock crossings exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockStatusChanged {
    pub product_id: ProductId,
    pub from: StockStatus,
    pub to: StockStatus,
    pub available: i64,
    pub occurred_at: DateTime<Utc>,
}

impl StockStatusChanged {
    /// `available` crossed from above zero to zero or below.
    pub fn is_depletion(&self) -> bool {
        self.to == StockStatus::OutOfStock && self.from != StockStatus::OutOfStock
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ProductRegistered(ProductRegistered),
    StockMoved(StockMoved),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    LowStockThresholdChanged(LowStockThresholdChanged),
    TrackingChanged(TrackingChanged),
    StockStatusChanged(StockStatusChanged),
}

impl InventoryEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::ProductRegistered(e) => e.product_id,
            InventoryEvent::StockMoved(e) => e.movement.product_id,
            InventoryEvent::StockReserved(e) => e.product_id,
            InventoryEvent::ReservationReleased(e) => e.product_id,
            InventoryEvent::LowStockThresholdChanged(e) => e.product_id,
            InventoryEvent::TrackingChanged(e) => e.product_id,
            InventoryEvent::StockStatusChanged(e) => e.product_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ProductRegistered(_) => "inventory.product.registered",
            InventoryEvent::StockMoved(_) => "inventory.stock.moved",
            InventoryEvent::StockReserved(_) => "inventory.stock.reserved",
            InventoryEvent::ReservationReleased(_) => "inventory.stock.reservation_released",
            InventoryEvent::LowStockThresholdChanged(_) => "inventory.stock.threshold_changed",
            InventoryEvent::TrackingChanged(_) => "inventory.stock.tracking_changed",
            InventoryEvent::StockStatusChanged(_) => "inventory.stock.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ProductRegistered(e) => e.occurred_at,
            InventoryEvent::StockMoved(e) => e.movement.movement_date,
            InventoryEvent::StockReserved(e) => e.occurred_at,
            InventoryEvent::ReservationReleased(e) => e.occurred_at,
            InventoryEvent::LowStockThresholdChanged(e) => e.occurred_at,
            InventoryEvent::TrackingChanged(e) => e.occurred_at,
            InventoryEvent::StockStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.stock = StockRecord::default()
                    .with_threshold(e.low_stock_threshold)
                    .with_tracking(e.track_inventory);
                self.movement_count = 0;
                self.created = true;
            }
            InventoryEvent::StockMoved(e) => {
                self.stock = self.stock.with_current(e.movement.new_stock);
                self.movement_count += 1;
                if let Some(reference) = &e.movement.reference {
                    self.references.insert(reference.clone());
                }
            }
            InventoryEvent::StockReserved(e) => {
                self.stock = self.stock.with_reserved(e.reserved_after);
            }
            InventoryEvent::ReservationReleased(e) => {
                self.stock = self.stock.with_reserved(e.reserved_after);
            }
            InventoryEvent::LowStockThresholdChanged(e) => {
                self.stock = self.stock.with_threshold(e.threshold);
            }
            InventoryEvent::TrackingChanged(e) => {
                self.stock = self.stock.with_tracking(e.track_inventory);
            }
            InventoryEvent::StockStatusChanged(_) => {}
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            InventoryCommand::RecordMovement(cmd) => {
                let events = self.handle_movement(cmd)?;
                Ok(self.with_status_change(events, cmd.occurred_at))
            }
            InventoryCommand::ReserveStock(cmd) => {
                let events = self.handle_reserve(cmd)?;
                Ok(self.with_status_change(events, cmd.occurred_at))
            }
            InventoryCommand::ReleaseReservation(cmd) => {
                let events = self.handle_release(cmd)?;
                Ok(self.with_status_change(events, cmd.occurred_at))
            }
            InventoryCommand::ReconcileCount(cmd) => {
                let events = self.handle_reconcile(cmd)?;
                Ok(self.with_status_change(events, cmd.occurred_at))
            }
            InventoryCommand::SetLowStockThreshold(cmd) => {
                let events = self.handle_threshold(cmd)?;
                Ok(self.with_status_change(events, cmd.occurred_at))
            }
            InventoryCommand::SetTrackInventory(cmd) => {
                let events = self.handle_tracking(cmd)?;
                Ok(self.with_status_change(events, cmd.occurred_at))
            }
        }
    }
}

fn clean_notes(notes: &Option<String>) -> Option<String> {
    notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

impl StockItem {
    fn ensure_registered(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("product {product_id}")));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    /// Append a `StockStatusChanged` if folding `events` changes the derived status.
    fn with_status_change(
        &self,
        mut events: Vec<InventoryEvent>,
        occurred_at: DateTime<Utc>,
    ) -> Vec<InventoryEvent> {
        if events.is_empty() {
            return events;
        }
        let mut next = self.clone();
        for e in &events {
            next.apply(e);
        }
        let (from, to) = (self.status(), next.status());
        if from != to {
            events.push(InventoryEvent::StockStatusChanged(StockStatusChanged {
                product_id: self.id,
                from,
                to,
                available: next.stock.available(),
                occurred_at,
            }));
        }
        events
    }

    #[allow(clippy::too_many_arguments)]
    fn movement(
        &self,
        movement_id: Uuid,
        movement_type: MovementType,
        quantity: i64,
        reason: MovementReason,
        unit_cost: i64,
        notes: Option<String>,
        reference: Option<String>,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementRecord, DomainError> {
        if unit_cost < 0 {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
        let new_stock = self.stock.plan_movement(movement_type, quantity)?;
        let total_cost = unit_cost
            .checked_mul(quantity)
            .ok_or_else(|| DomainError::validation("total cost overflows"))?;

        Ok(MovementRecord {
            movement_id,
            product_id: self.id,
            movement_type,
            quantity,
            previous_stock: self.stock.current(),
            new_stock,
            unit_cost,
            total_cost,
            reason,
            created_by: actor,
            movement_date: occurred_at,
            notes,
            reference,
        })
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already registered"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        let empty = StockRecord::new(cmd.low_stock_threshold, cmd.track_inventory)?;

        let mut events = vec![InventoryEvent::ProductRegistered(ProductRegistered {
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            low_stock_threshold: cmd.low_stock_threshold,
            track_inventory: cmd.track_inventory,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.initial_stock > 0 {
            events.push(InventoryEvent::StockMoved(StockMoved {
                movement: MovementRecord {
                    movement_id: cmd.initial_movement_id,
                    product_id: cmd.product_id,
                    movement_type: MovementType::InitialStock,
                    quantity: cmd.initial_stock,
                    previous_stock: empty.current(),
                    new_stock: cmd.initial_stock,
                    unit_cost: 0,
                    total_cost: 0,
                    reason: MovementReason::InitialStock,
                    created_by: cmd.actor,
                    movement_date: cmd.occurred_at,
                    notes: None,
                    reference: None,
                },
            }));
        }

        Ok(events)
    }

    fn handle_movement(&self, cmd: &RecordMovement) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.product_id)?;
        let reference = clean_notes(&cmd.reference);
        if let Some(reference) = &reference {
            if self.references.contains(reference) {
                return Err(DomainError::conflict(format!(
                    "reference '{reference}' is already booked for product {}",
                    self.id
                )));
            }
        }

        let movement = self.movement(
            cmd.movement_id,
            cmd.movement_type,
            cmd.quantity,
            cmd.reason,
            cmd.unit_cost,
            clean_notes(&cmd.notes),
            reference,
            cmd.actor,
            cmd.occurred_at,
        )?;

        Ok(vec![InventoryEvent::StockMoved(StockMoved { movement })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.product_id)?;
        let reserved_after = self.stock.plan_reservation(cmd.quantity)?;

        Ok(vec![InventoryEvent::StockReserved(StockReserved {
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            reserved_after,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.product_id)?;
        let reserved_after = self.stock.plan_release(cmd.quantity)?;

        Ok(vec![InventoryEvent::ReservationReleased(ReservationReleased {
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            reserved_after,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reconcile(&self, cmd: &ReconcileCount) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.product_id)?;
        if cmd.counted < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }

        let delta = cmd.counted - self.stock.current();
        if delta == 0 {
            return Ok(vec![]);
        }
        let movement_type = if delta > 0 {
            MovementType::AdjustmentIn
        } else {
            MovementType::AdjustmentOut
        };

        let movement = self.movement(
            cmd.movement_id,
            movement_type,
            delta.abs(),
            MovementReason::InventoryCount,
            0,
            clean_notes(&cmd.notes),
            None,
            cmd.actor,
            cmd.occurred_at,
        )?;

        Ok(vec![InventoryEvent::StockMoved(StockMoved { movement })])
    }

    fn handle_threshold(&self, cmd: &SetLowStockThreshold) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.product_id)?;
        if cmd.threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        if cmd.threshold == self.stock.low_stock_threshold() {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::LowStockThresholdChanged(LowStockThresholdChanged {
            product_id: cmd.product_id,
            threshold: cmd.threshold,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_tracking(&self, cmd: &SetTrackInventory) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_registered(cmd.product_id)?;
        if cmd.track_inventory == self.stock.track_inventory() {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::TrackingChanged(TrackingChanged {
            product_id: cmd.product_id,
            track_inventory: cmd.track_inventory,
            occurred_at: cmd.occurred_at,
        })])
    }
}
