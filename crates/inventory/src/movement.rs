use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{DomainError, UserId};

use crate::item::ProductId;

/// Whether a movement adds to or removes from on-hand stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    In,
    Out,
}

/// Kind of stock movement recorded in the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    AdjustmentIn,
    AdjustmentOut,
    Sale,
    Purchase,
    ReturnIn,
    ReturnOut,
    DamageLoss,
    TransferIn,
    TransferOut,
    InventoryCount,
    ProductionIn,
    ProductionOut,
    InitialStock,
}

impl MovementType {
    pub const ALL: [MovementType; 13] = [
        MovementType::AdjustmentIn,
        MovementType::AdjustmentOut,
        MovementType::Sale,
        MovementType::Purchase,
        MovementType::ReturnIn,
        MovementType::ReturnOut,
        MovementType::DamageLoss,
        MovementType::TransferIn,
        MovementType::TransferOut,
        MovementType::InventoryCount,
        MovementType::ProductionIn,
        MovementType::ProductionOut,
        MovementType::InitialStock,
    ];

    pub fn direction(self) -> MovementDirection {
        match self {
            MovementType::AdjustmentIn
            | MovementType::Purchase
            | MovementType::ReturnIn
            | MovementType::TransferIn
            | MovementType::ProductionIn
            | MovementType::InitialStock => MovementDirection::In,
            MovementType::AdjustmentOut
            | MovementType::Sale
            | MovementType::ReturnOut
            | MovementType::DamageLoss
            | MovementType::TransferOut
            | MovementType::InventoryCount
            | MovementType::ProductionOut => MovementDirection::Out,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::AdjustmentIn => "adjustment_in",
            MovementType::AdjustmentOut => "adjustment_out",
            MovementType::Sale => "sale",
            MovementType::Purchase => "purchase",
            MovementType::ReturnIn => "return_in",
            MovementType::ReturnOut => "return_out",
            MovementType::DamageLoss => "damage_loss",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
            MovementType::InventoryCount => "inventory_count",
            MovementType::ProductionIn => "production_in",
            MovementType::ProductionOut => "production_out",
            MovementType::InitialStock => "initial_stock",
        }
    }

    /// Apply a positive `quantity` to `previous` in this type's direction.
    ///
    /// Returns `None` on arithmetic overflow. A negative result is returned
    /// as-is; rejecting it is the caller's job.
    pub fn apply_to(self, previous: i64, quantity: i64) -> Option<i64> {
        match self.direction() {
            MovementDirection::In => previous.checked_add(quantity),
            MovementDirection::Out => previous.checked_sub(quantity),
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid movement type '{s}'")))
    }
}

/// Business reason attached to a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    StockReceived,
    StockSold,
    CustomerReturn,
    SupplierReturn,
    Damaged,
    Expired,
    Lost,
    Theft,
    InventoryCount,
    Transfer,
    Production,
    InitialStock,
    Correction,
    Other,
}

impl MovementReason {
    pub const ALL: [MovementReason; 14] = [
        MovementReason::StockReceived,
        MovementReason::StockSold,
        MovementReason::CustomerReturn,
        MovementReason::SupplierReturn,
        MovementReason::Damaged,
        MovementReason::Expired,
        MovementReason::Lost,
        MovementReason::Theft,
        MovementReason::InventoryCount,
        MovementReason::Transfer,
        MovementReason::Production,
        MovementReason::InitialStock,
        MovementReason::Correction,
        MovementReason::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementReason::StockReceived => "stock_received",
            MovementReason::StockSold => "stock_sold",
            MovementReason::CustomerReturn => "customer_return",
            MovementReason::SupplierReturn => "supplier_return",
            MovementReason::Damaged => "damaged",
            MovementReason::Expired => "expired",
            MovementReason::Lost => "lost",
            MovementReason::Theft => "theft",
            MovementReason::InventoryCount => "inventory_count",
            MovementReason::Transfer => "transfer",
            MovementReason::Production => "production",
            MovementReason::InitialStock => "initial_stock",
            MovementReason::Correction => "correction",
            MovementReason::Other => "other",
        }
    }
}

impl core::fmt::Display for MovementReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DomainError::validation("reason is required"));
        }
        MovementReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid movement reason '{s}'")))
    }
}

/// One immutable ledger row.
///
/// `quantity` is always a positive magnitude; the sign lives in
/// `movement_type.direction()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub movement_id: Uuid,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// Minor currency units per item.
    pub unit_cost: i64,
    pub total_cost: i64,
    pub reason: MovementReason,
    pub created_by: UserId,
    pub movement_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// External document this movement belongs to (reorder request, order number).
    pub reference: Option<String>,
}

impl MovementRecord {
    pub fn direction(&self) -> MovementDirection {
        self.movement_type.direction()
    }

    /// Signed change this movement made to on-hand stock.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction() {
            MovementDirection::In => self.quantity,
            MovementDirection::Out => -self.quantity,
        }
    }

    /// Ledger arithmetic holds for this row.
    pub fn is_consistent(&self) -> bool {
        self.quantity > 0
            && self.new_stock >= 0
            && self.movement_type.apply_to(self.previous_stock, self.quantity) == Some(self.new_stock)
            && self.unit_cost.checked_mul(self.quantity) == Some(self.total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_types_match_the_ledger_table() {
        let inbound: Vec<_> = MovementType::ALL
            .into_iter()
            .filter(|t| t.direction() == MovementDirection::In)
            .collect();
        assert_eq!(
            inbound,
            vec![
                MovementType::AdjustmentIn,
                MovementType::Purchase,
                MovementType::ReturnIn,
                MovementType::TransferIn,
                MovementType::ProductionIn,
                MovementType::InitialStock,
            ]
        );
    }

    #[test]
    fn type_names_parse_back() {
        for t in MovementType::ALL {
            assert_eq!(t.as_str().parse::<MovementType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
        }
    }

    #[test]
    fn unknown_type_is_a_validation_error() {
        let err = "restock".parse::<MovementType>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("restock")));
    }

    #[test]
    fn blank_reason_is_required() {
        let err = "  ".parse::<MovementReason>().unwrap_err();
        assert_eq!(err, DomainError::validation("reason is required"));
        assert_eq!(
            "stock_sold".parse::<MovementReason>().unwrap(),
            MovementReason::StockSold
        );
    }

    #[test]
    fn apply_to_respects_direction_and_overflow() {
        assert_eq!(MovementType::Sale.apply_to(10, 3), Some(7));
        assert_eq!(MovementType::Purchase.apply_to(10, 3), Some(13));
        assert_eq!(MovementType::Sale.apply_to(1, 3), Some(-2));
        assert_eq!(MovementType::Purchase.apply_to(i64::MAX, 1), None);
    }
}
