//! Outbound notifications (supplier and staff alerts).
//!
//! Delivery is fire-and-forget: services call [`notify_best_effort`] after a
//! state change has committed, and a failed notification is logged, never
//! rolled back. Actual email/SMS delivery lives outside this workspace; the
//! adapters here log or forward onto a bus.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use stockroom_core::AggregateId;
use stockroom_events::EventBus;
use stockroom_parties::PartyId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ReorderCreated,
    SupplierResponded,
    ReorderDelivered,
    ReorderRejected,
    StockStatusChanged,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::ReorderCreated => "reorder_created",
            NotificationKind::SupplierResponded => "supplier_responded",
            NotificationKind::ReorderDelivered => "reorder_delivered",
            NotificationKind::ReorderRejected => "reorder_rejected",
            NotificationKind::StockStatusChanged => "stock_status_changed",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "party_id", rename_all = "snake_case")]
pub enum Recipient {
    Supplier(PartyId),
    Staff,
}

impl core::fmt::Display for Recipient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Recipient::Supplier(party) => write!(f, "supplier:{party}"),
            Recipient::Staff => f.write_str("staff"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    /// Reorder request or product the notification is about.
    pub subject: AggregateId,
    pub payload: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

impl<N> NotificationDispatcher for Arc<N>
where
    N: NotificationDispatcher + ?Sized,
{
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).notify(notification)
    }
}

/// Send and swallow: the caller's state change has already committed.
pub fn notify_best_effort<N>(dispatcher: &N, notification: Notification)
where
    N: NotificationDispatcher + ?Sized,
{
    if let Err(err) = dispatcher.notify(&notification) {
        warn!(
            kind = notification.kind.as_str(),
            recipient = %notification.recipient,
            subject = %notification.subject,
            error = %err,
            "notification failed"
        );
    }
}

/// Writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            kind = notification.kind.as_str(),
            recipient = %notification.recipient,
            subject = %notification.subject,
            payload = %notification.payload,
            "notification"
        );
        Ok(())
    }
}

/// Forwards notifications onto a bus for a delivery worker to pick up.
#[derive(Debug)]
pub struct BusNotifier<B> {
    bus: B,
}

impl<B> BusNotifier<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> NotificationDispatcher for BusNotifier<B>
where
    B: EventBus<Notification>,
{
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.bus
            .publish(notification.clone())
            .map_err(|e| NotifyError::Transport(format!("{e:?}")))
    }
}
