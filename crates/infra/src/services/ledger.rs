//! Read-only queries over a product's movement ledger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use stockroom_core::DomainError;
use stockroom_inventory::{
    InventoryEvent, MovementFilter, MovementRecord, MovementTypeStats, ProductId, summarize,
};

use crate::command_dispatcher::DispatchError;
use crate::config::LedgerConfig;
use crate::event_store::EventStore;
use crate::streams;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// `None` uses the configured default page size.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPage {
    pub items: Vec<MovementRecord>,
    /// Matching movements before paging.
    pub total: usize,
    pub next_offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementStats {
    pub product_id: ProductId,
    pub window_days: u32,
    pub since: DateTime<Utc>,
    pub by_type: Vec<MovementTypeStats>,
}

/// Movement history and statistics, read straight from the product's stream.
pub struct MovementLedger<S> {
    store: S,
    config: Arc<LedgerConfig>,
}

impl<S> MovementLedger<S>
where
    S: EventStore,
{
    pub fn new(store: S, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    /// Filtered, paged history, newest first.
    ///
    /// Movements sharing a `movement_date` come back in reverse append order.
    #[instrument(skip(self))]
    pub fn history(
        &self,
        product_id: ProductId,
        filter: &MovementFilter,
        page: Pagination,
    ) -> Result<MovementPage, DispatchError> {
        let limit = self.resolve_limit(page.limit)?;
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(DomainError::validation("'from' must not be after 'to'").into());
            }
        }

        let mut matching: Vec<MovementRecord> = self
            .movements(product_id)?
            .into_iter()
            .rev()
            .filter(|m| filter.matches(m))
            .collect();
        // Stable sort keeps the reversed append order for equal dates.
        matching.sort_by(|a, b| b.movement_date.cmp(&a.movement_date));

        let total = matching.len();
        let start = (page.offset as usize).min(total);
        let items: Vec<_> = matching.into_iter().skip(start).take(limit as usize).collect();
        let end = start + items.len();
        let next_offset = (end < total).then(|| end as u32);

        debug!(%product_id, total, returned = items.len(), "movement history");
        Ok(MovementPage {
            items,
            total,
            next_offset,
        })
    }

    /// Per-type totals over the trailing `window_days` (configured default
    /// when `None`).
    #[instrument(skip(self))]
    pub fn stats(&self, product_id: ProductId, window_days: Option<u32>) -> Result<MovementStats, DispatchError> {
        let window_days = window_days.unwrap_or(self.config.stats_window_days);
        if window_days == 0 {
            return Err(DomainError::validation("stats window must be at least one day").into());
        }

        let since = Duration::try_days(i64::from(window_days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                DomainError::validation(format!("stats window of {window_days} days is out of range"))
            })?;
        let movements = self.movements(product_id)?;
        let by_type = summarize(&movements, since);

        debug!(%product_id, window_days, types = by_type.len(), "movement stats");
        Ok(MovementStats {
            product_id,
            window_days,
            since,
            by_type,
        })
    }

    /// Every movement of the product in append order.
    pub fn movements(&self, product_id: ProductId) -> Result<Vec<MovementRecord>, DispatchError> {
        let stream = self.store.load_stream(product_id.0)?;
        if stream.first().is_none_or(|e| e.aggregate_type != streams::STOCK_ITEM) {
            return Err(DomainError::not_found(format!("product {product_id}")).into());
        }

        let mut out = Vec::new();
        for stored in stream {
            let event: InventoryEvent = serde_json::from_value(stored.payload).map_err(|e| {
                DispatchError::Deserialize(format!(
                    "event {} ({}): {e}",
                    stored.event_id, stored.event_type
                ))
            })?;
            if let InventoryEvent::StockMoved(moved) = event {
                out.push(moved.movement);
            }
        }
        Ok(out)
    }

    fn resolve_limit(&self, requested: Option<u32>) -> Result<u32, DispatchError> {
        match requested {
            Some(0) => Err(DomainError::validation("limit must be at least 1").into()),
            Some(limit) => Ok(limit.min(self.config.max_page_size)),
            None => Ok(self.config.default_page_size),
        }
    }
}
