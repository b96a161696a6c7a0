use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_core::UserId;
use stockroom_events::EventEnvelope;
use stockroom_inventory::ProductId;
use stockroom_parties::PartyId;
use stockroom_reorder::{ReorderEvent, ReorderRequestId, ReorderStatus, Urgency};

use super::{Projection, ProjectionError, StreamCursors};
use crate::read_model::ReadStore;
use crate::streams;

/// List row for a reorder request. Related product and supplier are ids
/// only; callers fetch them explicitly when they need more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderSummary {
    pub request_id: ReorderRequestId,
    pub product_id: ProductId,
    pub supplier_id: PartyId,
    pub requested_by: UserId,
    pub quantity: i64,
    pub urgency: Urgency,
    pub status: ReorderStatus,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub timeline_len: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderFilter {
    pub status: Option<ReorderStatus>,
    pub supplier_id: Option<PartyId>,
    pub product_id: Option<ProductId>,
}

impl ReorderFilter {
    pub fn matches(&self, summary: &ReorderSummary) -> bool {
        self.status.is_none_or(|s| summary.status == s)
            && self.supplier_id.is_none_or(|s| summary.supplier_id == s)
            && self.product_id.is_none_or(|p| summary.product_id == p)
    }
}

/// Reorder request list projection.
#[derive(Debug)]
pub struct ReorderProjection<S>
where
    S: ReadStore<ReorderRequestId, ReorderSummary>,
{
    store: S,
    cursors: RwLock<StreamCursors>,
}

impl<S> ReorderProjection<S>
where
    S: ReadStore<ReorderRequestId, ReorderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(StreamCursors::new()),
        }
    }

    pub fn get(&self, request_id: &ReorderRequestId) -> Option<ReorderSummary> {
        self.store.get(request_id)
    }

    /// Matching requests, newest first.
    pub fn list(&self, filter: &ReorderFilter) -> Vec<ReorderSummary> {
        let mut rows: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.request_id.cmp(&a.request_id))
        });
        rows
    }

    fn fold(&self, event: ReorderEvent) -> Result<(), ProjectionError> {
        let request_id = event.request_id();

        let summary = match event {
            ReorderEvent::ReorderRequested(e) => ReorderSummary {
                request_id,
                product_id: e.product_id,
                supplier_id: e.supplier_id,
                requested_by: e.requested_by,
                quantity: e.quantity,
                urgency: e.urgency,
                status: ReorderStatus::Pending,
                expected_delivery_date: e.expected_delivery_date,
                timeline_len: 1,
                created_at: e.occurred_at,
                updated_at: e.occurred_at,
            },
            ReorderEvent::ReorderStatusChanged(e) => {
                let mut s = self.existing(request_id)?;
                s.status = e.to;
                if let Some(eta) = e.supplier_response.and_then(|r| r.estimated_delivery) {
                    s.expected_delivery_date = Some(eta);
                }
                s.timeline_len += 1;
                s.updated_at = e.occurred_at;
                s
            }
            ReorderEvent::ReorderNoteAdded(e) => {
                let mut s = self.existing(request_id)?;
                s.timeline_len += 1;
                s.updated_at = e.occurred_at;
                s
            }
        };

        self.store.upsert(request_id, summary);
        Ok(())
    }

    fn existing(&self, request_id: ReorderRequestId) -> Result<ReorderSummary, ProjectionError> {
        self.store.get(&request_id).ok_or_else(|| {
            ProjectionError::Mismatch(format!("reorder event for unknown request {request_id}"))
        })
    }
}

impl<S> Projection for ReorderProjection<S>
where
    S: ReadStore<ReorderRequestId, ReorderSummary>,
{
    fn name(&self) -> &'static str {
        "reorders"
    }

    fn aggregate_type(&self) -> &'static str {
        streams::REORDER_REQUEST
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::REORDER_REQUEST {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let mut cursors = self
            .cursors
            .write()
            .map_err(|_| ProjectionError::Poisoned(self.name()))?;
        if !cursors.should_apply(aggregate_id, seq)? {
            return Ok(());
        }

        let event: ReorderEvent = serde_json::from_value(envelope.payload().clone()).map_err(|e| {
            ProjectionError::Deserialize {
                aggregate_type: streams::REORDER_REQUEST,
                message: e.to_string(),
            }
        })?;
        if event.request_id().0 != aggregate_id {
            return Err(ProjectionError::Mismatch(
                "event request_id does not match envelope aggregate_id".to_string(),
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
