//! Reorder request workflow: creation, status updates, notes and reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info, instrument};

use stockroom_auth::{Actor, Capability, Role, authorize};
use stockroom_core::{AggregateId, DomainError};
use stockroom_events::{EventBus, EventEnvelope};
use stockroom_inventory::{ProductId, StockItem};
use stockroom_parties::{Party, PartyId};
use stockroom_reorder::{
    AddReorderNote, CreateReorderRequest, ReorderCommand, ReorderEvent, ReorderRequest,
    ReorderRequestId, ReorderStatus, SupplierEstimate, UpdateReorderStatus, Urgency,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;
use crate::notifications::{
    Notification, NotificationDispatcher, NotificationKind, Recipient, notify_best_effort,
};
use crate::projections::{ReorderFilter, ReorderProjection, ReorderSummary};
use crate::read_model::ReadStore;
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReorder {
    pub product_id: ProductId,
    pub supplier_id: PartyId,
    pub quantity: i64,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub message: String,
    pub expected_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub message: Option<String>,
    pub estimate: Option<SupplierEstimate>,
}

pub struct ReorderService<S, B, R>
where
    R: ReadStore<ReorderRequestId, ReorderSummary>,
{
    dispatcher: Arc<CommandDispatcher<S, B>>,
    notifier: Arc<dyn NotificationDispatcher>,
    listing: Arc<ReorderProjection<R>>,
}

impl<S, B, R> ReorderService<S, B, R>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    R: ReadStore<ReorderRequestId, ReorderSummary>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        notifier: Arc<dyn NotificationDispatcher>,
        listing: Arc<ReorderProjection<R>>,
    ) -> Self {
        Self {
            dispatcher,
            notifier,
            listing,
        }
    }

    /// Open a request against an active supplier. Starts `pending`.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub fn create(&self, actor: &Actor, new: NewReorder) -> Result<ReorderRequest, DispatchError> {
        authorize(actor, Capability::CreateReorder, None).map_err(DomainError::from)?;

        let product = self
            .dispatcher
            .load(new.product_id.0, streams::STOCK_ITEM, |id| {
                StockItem::empty(ProductId::new(id))
            })?;
        if !product.is_registered() {
            return Err(DomainError::not_found(format!("product {}", new.product_id)).into());
        }

        let supplier = self
            .dispatcher
            .load(new.supplier_id.0, streams::PARTY, |id| Party::empty(PartyId::new(id)))?;
        supplier.ensure_active_supplier()?;

        let request_id = ReorderRequestId::new(AggregateId::new());
        let cmd = ReorderCommand::Create(CreateReorderRequest {
            request_id,
            product_id: new.product_id,
            supplier_id: new.supplier_id,
            quantity: new.quantity,
            urgency: new.urgency,
            message: new.message,
            expected_delivery_date: new.expected_delivery_date,
            requested_by: actor.clone(),
            occurred_at: Utc::now(),
        });
        let request = self.run(request_id, &cmd)?;

        info!(
            %request_id,
            product_id = %new.product_id,
            supplier_id = %new.supplier_id,
            quantity = request.quantity(),
            urgency = request.urgency().as_str(),
            "reorder request created"
        );
        notify_best_effort(
            self.notifier.as_ref(),
            Notification {
                kind: NotificationKind::ReorderCreated,
                recipient: Recipient::Supplier(new.supplier_id),
                subject: request_id.0,
                payload: json!({
                    "request_id": request_id,
                    "product_id": new.product_id,
                    "quantity": request.quantity(),
                    "urgency": request.urgency(),
                    "message": request.message(),
                }),
                occurred_at: request.created_at().unwrap_or_else(Utc::now),
            },
        );

        Ok(request)
    }

    /// Move a request to `status`.
    ///
    /// Participant check, then the transition table, then the role the
    /// target status requires. A rejected update leaves the request as it was.
    #[instrument(skip(self, actor, update), fields(actor = %actor.user_id))]
    pub fn update_status(
        &self,
        actor: &Actor,
        request_id: ReorderRequestId,
        status: ReorderStatus,
        update: StatusUpdate,
    ) -> Result<ReorderRequest, DispatchError> {
        let cmd = ReorderCommand::UpdateStatus(UpdateReorderStatus {
            request_id,
            status,
            actor: actor.clone(),
            message: update.message,
            estimate: update.estimate,
            occurred_at: Utc::now(),
        });
        let Dispatched {
            aggregate: request,
            events,
            ..
        } = self.dispatch(request_id, &cmd)?;

        for event in &events {
            if let ReorderEvent::ReorderStatusChanged(e) = event {
                info!(%request_id, from = %e.from, to = %e.to, "reorder status changed");
                if let Some(notification) = status_notification(&request, e.to, e.occurred_at) {
                    notify_best_effort(self.notifier.as_ref(), notification);
                }
            }
        }

        Ok(request)
    }

    /// Append a discussion note. Staff or the assigned supplier only.
    #[instrument(skip(self, actor, message), fields(actor = %actor.user_id))]
    pub fn add_note(
        &self,
        actor: &Actor,
        request_id: ReorderRequestId,
        message: String,
    ) -> Result<ReorderRequest, DispatchError> {
        let cmd = ReorderCommand::AddNote(AddReorderNote {
            request_id,
            actor: actor.clone(),
            message,
            occurred_at: Utc::now(),
        });
        let request = self.run(request_id, &cmd)?;
        info!(%request_id, notes = request.notes().len(), "reorder note added");
        Ok(request)
    }

    /// Full request with its timeline and notes.
    pub fn get(&self, actor: &Actor, request_id: ReorderRequestId) -> Result<ReorderRequest, DispatchError> {
        let request = self.load(request_id)?;
        request.ensure_readable_by(actor)?;
        Ok(request)
    }

    /// Rehydrate without a capability check; for workflows acting on
    /// committed events.
    pub(crate) fn load(&self, request_id: ReorderRequestId) -> Result<ReorderRequest, DispatchError> {
        self.dispatcher
            .load(request_id.0, streams::REORDER_REQUEST, |id| {
                ReorderRequest::empty(ReorderRequestId::new(id))
            })
    }

    /// Newest first, from the reorder read model.
    ///
    /// Suppliers only ever see requests addressed to their own party.
    pub fn list(&self, actor: &Actor, filter: &ReorderFilter) -> Result<Vec<ReorderSummary>, DispatchError> {
        let mut filter = filter.clone();

        match (actor.role, actor.party_id) {
            (Role::Supplier, Some(own)) => {
                let own = PartyId::new(own);
                if filter.supplier_id.is_some_and(|asked| asked != own) {
                    return Ok(vec![]);
                }
                filter.supplier_id = Some(own);
            }
            // Staff pass; customers and supplier accounts without a party do not.
            _ => authorize(actor, Capability::ReadReorder, None).map_err(DomainError::from)?,
        }

        let rows = self.listing.list(&filter);
        debug!(rows = rows.len(), ?filter, "reorder list");
        Ok(rows)
    }

    fn run(&self, request_id: ReorderRequestId, cmd: &ReorderCommand) -> Result<ReorderRequest, DispatchError> {
        Ok(self.dispatch(request_id, cmd)?.aggregate)
    }

    fn dispatch(
        &self,
        request_id: ReorderRequestId,
        cmd: &ReorderCommand,
    ) -> Result<Dispatched<ReorderRequest>, DispatchError> {
        self.dispatcher.dispatch(request_id.0, streams::REORDER_REQUEST, cmd, |id| {
            ReorderRequest::empty(ReorderRequestId::new(id))
        })
    }
}

/// Who hears about a status change: staff for supplier progress, the
/// supplier for the final outcome.
fn status_notification(
    request: &ReorderRequest,
    to: ReorderStatus,
    occurred_at: DateTime<Utc>,
) -> Option<Notification> {
    let supplier_id = request.supplier_id()?;
    let (kind, recipient) = match to {
        ReorderStatus::Acknowledged | ReorderStatus::InProgress | ReorderStatus::Shipped => {
            (NotificationKind::SupplierResponded, Recipient::Staff)
        }
        ReorderStatus::Delivered => (NotificationKind::ReorderDelivered, Recipient::Supplier(supplier_id)),
        ReorderStatus::Rejected => (NotificationKind::ReorderRejected, Recipient::Supplier(supplier_id)),
        ReorderStatus::Pending => return None,
    };

    let response = request.supplier_response();
    Some(Notification {
        kind,
        recipient,
        subject: request.id_typed().0,
        payload: json!({
            "request_id": request.id_typed(),
            "supplier_id": supplier_id,
            "status": to,
            "expected_delivery_date": request.expected_delivery_date(),
            "estimated_price": response.and_then(|r| r.estimated_price),
        }),
        occurred_at,
    })
}
