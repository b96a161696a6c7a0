//! Delivered reorder → stock receipt.
//!
//! 1. A request reaches `delivered` (through [`RestockWorkflow::deliver`] or
//!    any other caller; [`RestockWorkflow::handle_envelope`] picks those up
//!    from the bus)
//! 2. A `purchase` movement of the requested quantity is recorded with reason
//!    `stock_received` and the request id as its reference
//!
//! The product aggregate books a reference at most once, and that check runs
//! under the same stream version as the append. A redelivered envelope, a
//! repeated `deliver` call or two runners racing on one delivery therefore
//! record a single receipt; the losers report `None`. The reorder aggregate
//! itself never touches stock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use stockroom_auth::Actor;
use stockroom_core::{DomainError, UserId};
use stockroom_events::{EventBus, EventEnvelope};
use stockroom_inventory::{MovementReason, MovementType};
use stockroom_reorder::{ReorderEvent, ReorderRequest, ReorderRequestId, ReorderStatus};

use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStore;
use crate::projections::ReorderSummary;
use crate::read_model::ReadStore;
use crate::services::{
    AdjustStock, AdjustmentOutcome, ReorderService, StatusUpdate, StockAdjustmentService,
};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub request_id: ReorderRequestId,
    pub status: ReorderStatus,
    /// `None` when the receipt had already been booked.
    pub restock: Option<AdjustmentOutcome>,
}

pub struct RestockWorkflow<S, B, R>
where
    R: ReadStore<ReorderRequestId, ReorderSummary>,
{
    reorders: Arc<ReorderService<S, B, R>>,
    stock: Arc<StockAdjustmentService<S, B>>,
}

impl<S, B, R> RestockWorkflow<S, B, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: ReadStore<ReorderRequestId, ReorderSummary>,
{
    pub fn new(
        reorders: Arc<ReorderService<S, B, R>>,
        stock: Arc<StockAdjustmentService<S, B>>,
    ) -> Self {
        Self { reorders, stock }
    }

    /// Mark the request delivered (staff only) and receive its stock.
    #[instrument(skip(self, actor, update), fields(actor = %actor.user_id))]
    pub fn deliver(
        &self,
        actor: &Actor,
        request_id: ReorderRequestId,
        update: StatusUpdate,
    ) -> Result<Delivery, DispatchError> {
        let current = self.reorders.get(actor, request_id)?;
        let request = if current.status() == ReorderStatus::Delivered {
            current
        } else {
            self.reorders
                .update_status(actor, request_id, ReorderStatus::Delivered, update)?
        };

        let restock = self.ensure_restocked(&request, actor.user_id)?;
        Ok(Delivery {
            request_id,
            status: request.status(),
            restock,
        })
    }

    /// Bus hook: receive stock for any request that was just delivered.
    ///
    /// Envelopes of other streams, and status changes to anything but
    /// `delivered`, are ignored.
    pub fn handle_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<Option<AdjustmentOutcome>, DispatchError> {
        if envelope.aggregate_type() != streams::REORDER_REQUEST {
            return Ok(None);
        }

        let event: ReorderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| DispatchError::Deserialize(format!("event {}: {e}", envelope.event_id())))?;
        let ReorderEvent::ReorderStatusChanged(changed) = event else {
            return Ok(None);
        };
        if changed.to != ReorderStatus::Delivered {
            return Ok(None);
        }

        let request = self.reorders.load(changed.request_id)?;
        self.ensure_restocked(&request, changed.actor)
    }

    /// Record the receipt for a delivered request unless it already exists.
    pub fn ensure_restocked(
        &self,
        request: &ReorderRequest,
        actor: UserId,
    ) -> Result<Option<AdjustmentOutcome>, DispatchError> {
        let request_id = request.id_typed();
        if request.status() != ReorderStatus::Delivered {
            return Err(DomainError::validation(format!(
                "reorder request {request_id} has not been delivered"
            ))
            .into());
        }
        let product_id = request
            .product_id()
            .ok_or_else(|| DomainError::invariant("delivered request without a product"))?;

        let reference = request_id.to_string();
        if self.stock.stock(product_id)?.has_reference(&reference) {
            debug!(%request_id, "delivery already received");
            return Ok(None);
        }

        let receipt = AdjustStock::new(
            product_id,
            MovementType::Purchase,
            request.quantity(),
            MovementReason::StockReceived,
            actor,
        )
        .with_reference(reference.clone())
        .with_notes(format!("Received against reorder request {request_id}"));

        let outcome = match self.stock.adjust(receipt) {
            Ok(outcome) => outcome,
            // Another runner booked it between the check above and the append.
            Err(DispatchError::Domain(DomainError::Conflict(_)))
                if self.stock.stock(product_id)?.has_reference(&reference) =>
            {
                debug!(%request_id, "delivery received concurrently");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        info!(
            %request_id,
            %product_id,
            quantity = request.quantity(),
            new_stock = outcome.movement.new_stock,
            "delivered reorder received into stock"
        );
        Ok(Some(outcome))
    }
}
