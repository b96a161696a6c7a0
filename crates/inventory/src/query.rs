//! Read-side filtering and rollups over movement records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::movement::{MovementReason, MovementRecord, MovementType};

/// Criteria for a movement history query. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    /// Inclusive lower bound on `movement_date`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `movement_date`.
    pub to: Option<DateTime<Utc>>,
    pub movement_type: Option<MovementType>,
    pub reason: Option<MovementReason>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &MovementRecord) -> bool {
        self.from.is_none_or(|from| movement.movement_date >= from)
            && self.to.is_none_or(|to| movement.movement_date <= to)
            && self.movement_type.is_none_or(|t| movement.movement_type == t)
            && self.reason.is_none_or(|r| movement.reason == r)
    }
}

/// Aggregate figures for one movement type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementTypeStats {
    pub movement_type: MovementType,
    pub total_quantity: i64,
    pub count: u64,
    pub avg_quantity: f64,
    pub total_cost: i64,
}

/// Group movements dated at or after `since` by type.
///
/// Output is ordered by movement type and omits types with no movements.
pub fn summarize<'a>(
    movements: impl IntoIterator<Item = &'a MovementRecord>,
    since: DateTime<Utc>,
) -> Vec<MovementTypeStats> {
    let mut groups: BTreeMap<MovementType, (i64, u64, i64)> = BTreeMap::new();

    for m in movements.into_iter().filter(|m| m.movement_date >= since) {
        let entry = groups.entry(m.movement_type).or_insert((0, 0, 0));
        entry.0 = entry.0.saturating_add(m.quantity);
        entry.1 += 1;
        entry.2 = entry.2.saturating_add(m.total_cost);
    }

    groups
        .into_iter()
        .map(|(movement_type, (total_quantity, count, total_cost))| MovementTypeStats {
            movement_type,
            total_quantity,
            count,
            avg_quantity: total_quantity as f64 / count as f64,
            total_cost,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockroom_core::{AggregateId, UserId};
    use uuid::Uuid;

    use crate::item::ProductId;

    fn movement(
        movement_type: MovementType,
        quantity: i64,
        unit_cost: i64,
        reason: MovementReason,
        at: DateTime<Utc>,
    ) -> MovementRecord {
        MovementRecord {
            movement_id: Uuid::now_v7(),
            product_id: ProductId::new(AggregateId::new()),
            movement_type,
            quantity,
            previous_stock: 100,
            new_stock: movement_type.apply_to(100, quantity).unwrap(),
            unit_cost,
            total_cost: unit_cost * quantity,
            reason,
            created_by: UserId::new(),
            movement_date: at,
            notes: None,
            reference: None,
        }
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let now = Utc::now();
        let m = movement(MovementType::Sale, 1, 0, MovementReason::StockSold, now);

        let exact = MovementFilter {
            from: Some(now),
            to: Some(now),
            ..MovementFilter::default()
        };
        assert!(exact.matches(&m));

        let later = MovementFilter {
            from: Some(now + Duration::seconds(1)),
            ..MovementFilter::default()
        };
        assert!(!later.matches(&m));
    }

    #[test]
    fn filter_by_type_and_reason() {
        let now = Utc::now();
        let sale = movement(MovementType::Sale, 1, 0, MovementReason::StockSold, now);
        let damage = movement(MovementType::DamageLoss, 1, 0, MovementReason::Damaged, now);

        let only_sales = MovementFilter {
            movement_type: Some(MovementType::Sale),
            ..MovementFilter::default()
        };
        assert!(only_sales.matches(&sale));
        assert!(!only_sales.matches(&damage));

        let only_damaged = MovementFilter {
            reason: Some(MovementReason::Damaged),
            ..MovementFilter::default()
        };
        assert!(only_damaged.matches(&damage));
        assert!(!only_damaged.matches(&sale));
    }

    #[test]
    fn summarize_groups_by_type_inside_window() {
        let now = Utc::now();
        let since = now - Duration::days(30);
        let movements = vec![
            movement(MovementType::Sale, 2, 100, MovementReason::StockSold, now),
            movement(MovementType::Sale, 4, 100, MovementReason::StockSold, now),
            movement(MovementType::Purchase, 10, 50, MovementReason::StockReceived, now),
            movement(MovementType::Sale, 99, 100, MovementReason::StockSold, now - Duration::days(31)),
        ];

        let stats = summarize(&movements, since);

        assert_eq!(stats.len(), 2);
        let sale = stats.iter().find(|s| s.movement_type == MovementType::Sale).unwrap();
        assert_eq!(sale.count, 2);
        assert_eq!(sale.total_quantity, 6);
        assert_eq!(sale.avg_quantity, 3.0);
        assert_eq!(sale.total_cost, 600);

        let purchase = stats.iter().find(|s| s.movement_type == MovementType::Purchase).unwrap();
        assert_eq!(purchase.total_cost, 500);
    }

    #[test]
    fn summarize_of_nothing_is_empty() {
        assert!(summarize(std::iter::empty(), Utc::now()).is_empty());
    }
}
