use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_auth::Capability;
use stockroom_core::DomainError;

/// Reorder request status lifecycle.
///
/// ```text
/// pending ──► acknowledged ──► in_progress ──► shipped ──► delivered
///    │             │                │
///    └─────────────┴────────────────┴──► rejected
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderStatus {
    Pending,
    Acknowledged,
    InProgress,
    Shipped,
    Delivered,
    Rejected,
}

impl ReorderStatus {
    pub const ALL: [ReorderStatus; 6] = [
        ReorderStatus::Pending,
        ReorderStatus::Acknowledged,
        ReorderStatus::InProgress,
        ReorderStatus::Shipped,
        ReorderStatus::Delivered,
        ReorderStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReorderStatus::Pending => "pending",
            ReorderStatus::Acknowledged => "acknowledged",
            ReorderStatus::InProgress => "in_progress",
            ReorderStatus::Shipped => "shipped",
            ReorderStatus::Delivered => "delivered",
            ReorderStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReorderStatus::Delivered | ReorderStatus::Rejected)
    }

    pub fn can_transition_to(self, next: ReorderStatus) -> bool {
        use ReorderStatus::*;
        matches!(
            (self, next),
            (Pending, Acknowledged)
                | (Pending, Rejected)
                | (Acknowledged, InProgress)
                | (Acknowledged, Rejected)
                | (InProgress, Shipped)
                | (InProgress, Rejected)
                | (Shipped, Delivered)
        )
    }

    /// Capability needed to move a request *into* this status.
    ///
    /// `None` for `pending`, which is only ever the initial status.
    pub fn required_capability(self) -> Option<Capability> {
        match self {
            ReorderStatus::Pending => None,
            ReorderStatus::Acknowledged | ReorderStatus::InProgress | ReorderStatus::Shipped => {
                Some(Capability::SupplierTransition)
            }
            ReorderStatus::Delivered | ReorderStatus::Rejected => Some(Capability::StaffTransition),
        }
    }

    /// Statuses the supplier moves into; these carry its response.
    pub fn is_supplier_response(self) -> bool {
        self.required_capability() == Some(Capability::SupplierTransition)
    }
}

impl core::fmt::Display for ReorderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReorderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReorderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid reorder status '{s}'")))
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Urgent => "urgent",
        }
    }
}

impl core::fmt::Display for Urgency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Urgency::Low, Urgency::Medium, Urgency::High, Urgency::Urgent]
            .into_iter()
            .find(|u| u.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid urgency '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_successors() {
        for from in [ReorderStatus::Delivered, ReorderStatus::Rejected] {
            assert!(from.is_terminal());
            for to in ReorderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn nothing_transitions_back_to_pending() {
        for from in ReorderStatus::ALL {
            assert!(!from.can_transition_to(ReorderStatus::Pending));
        }
    }

    #[test]
    fn shipped_can_only_be_delivered() {
        let next: Vec<_> = ReorderStatus::ALL
            .into_iter()
            .filter(|to| ReorderStatus::Shipped.can_transition_to(*to))
            .collect();
        assert_eq!(next, vec![ReorderStatus::Delivered]);
    }

    #[test]
    fn capabilities_split_supplier_and_staff_moves() {
        assert!(ReorderStatus::Acknowledged.is_supplier_response());
        assert!(ReorderStatus::Shipped.is_supplier_response());
        assert_eq!(
            ReorderStatus::Delivered.required_capability(),
            Some(Capability::StaffTransition)
        );
        assert_eq!(ReorderStatus::Pending.required_capability(), None);
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!(
            "in_progress".parse::<ReorderStatus>().unwrap(),
            ReorderStatus::InProgress
        );
        assert!("cancelled".parse::<ReorderStatus>().is_err());
        assert_eq!("urgent".parse::<Urgency>().unwrap(), Urgency::Urgent);
    }
}
