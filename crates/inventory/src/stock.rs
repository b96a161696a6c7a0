use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult};

use crate::movement::MovementType;

/// Externally visible availability derived from a [`StockRecord`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Status for the given figures. Untracked products are always in stock.
    pub fn derive(available: i64, low_stock_threshold: i64, track_inventory: bool) -> Self {
        if !track_inventory {
            StockStatus::InStock
        } else if available <= 0 {
            StockStatus::OutOfStock
        } else if available <= low_stock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantity state of one product.
///
/// `available` is always `current - reserved`; every constructor and mutator
/// recomputes it, and deserialisation ignores any stored value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStockRecord")]
pub struct StockRecord {
    current: i64,
    reserved: i64,
    available: i64,
    low_stock_threshold: i64,
    track_inventory: bool,
}

#[derive(Deserialize)]
struct RawStockRecord {
    current: i64,
    reserved: i64,
    low_stock_threshold: i64,
    track_inventory: bool,
}

impl From<RawStockRecord> for StockRecord {
    fn from(raw: RawStockRecord) -> Self {
        Self {
            current: raw.current,
            reserved: raw.reserved,
            available: 0,
            low_stock_threshold: raw.low_stock_threshold,
            track_inventory: raw.track_inventory,
        }
        .recomputed()
    }
}

impl Default for StockRecord {
    fn default() -> Self {
        Self {
            current: 0,
            reserved: 0,
            available: 0,
            low_stock_threshold: 0,
            track_inventory: true,
        }
    }
}

impl StockRecord {
    /// An empty record (nothing on hand, nothing reserved).
    pub fn new(low_stock_threshold: i64, track_inventory: bool) -> DomainResult<Self> {
        if low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        Ok(Self {
            low_stock_threshold,
            track_inventory,
            ..Self::default()
        })
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    pub fn track_inventory(&self) -> bool {
        self.track_inventory
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::derive(self.available, self.low_stock_threshold, self.track_inventory)
    }

    /// Stock level after moving `quantity` units of `movement_type`.
    ///
    /// Rejects non-positive quantities and any outbound movement that would
    /// leave `current` below zero, whether or not inventory is tracked.
    pub fn plan_movement(&self, movement_type: MovementType, quantity: i64) -> DomainResult<i64> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let new_stock = movement_type
            .apply_to(self.current, quantity)
            .ok_or_else(|| DomainError::validation("quantity overflows stock level"))?;
        if new_stock < 0 {
            return Err(DomainError::insufficient_stock(quantity, self.current));
        }
        Ok(new_stock)
    }

    /// Check a reservation of `quantity` units. Untracked products have no ceiling.
    pub fn plan_reservation(&self, quantity: i64) -> DomainResult<i64> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if self.track_inventory && quantity > self.available {
            return Err(DomainError::insufficient_stock(quantity, self.available));
        }
        self.reserved
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("quantity overflows reservation"))
    }

    pub fn plan_release(&self, quantity: i64) -> DomainResult<i64> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if quantity > self.reserved {
            return Err(DomainError::validation(format!(
                "cannot release {quantity} units, only {} reserved",
                self.reserved
            )));
        }
        Ok(self.reserved - quantity)
    }

    pub(crate) fn with_current(self, current: i64) -> Self {
        Self { current, ..self }.recomputed()
    }

    pub(crate) fn with_reserved(self, reserved: i64) -> Self {
        Self { reserved, ..self }.recomputed()
    }

    pub(crate) fn with_threshold(self, low_stock_threshold: i64) -> Self {
        Self {
            low_stock_threshold,
            ..self
        }
    }

    pub(crate) fn with_tracking(self, track_inventory: bool) -> Self {
        Self {
            track_inventory,
            ..self
        }
    }

    fn recomputed(mut self) -> Self {
        self.available = self.current - self.reserved;
        self
    }
}
