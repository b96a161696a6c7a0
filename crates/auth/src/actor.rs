use serde::{Deserialize, Serialize};

use stockroom_core::{AggregateId, UserId};

use crate::Role;

/// An authenticated caller.
///
/// Supplier accounts are linked to the party they act for; `party_id` is what
/// gets compared against a reorder request's assigned supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub party_id: Option<AggregateId>,
}

impl Actor {
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            party_id: None,
        }
    }

    pub fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Staff,
            party_id: None,
        }
    }

    pub fn supplier(user_id: UserId, party_id: AggregateId) -> Self {
        Self {
            user_id,
            role: Role::Supplier,
            party_id: Some(party_id),
        }
    }

    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
            party_id: None,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Whether this actor is the supplier account for `party`.
    pub fn acts_for(&self, party: AggregateId) -> bool {
        self.role == Role::Supplier && self.party_id == Some(party)
    }
}
