use thiserror::Error;

use stockroom_core::{AggregateId, DomainError};

use crate::{Actor, Capability, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{role} may not {capability}")]
    Forbidden { role: Role, capability: Capability },

    #[error("supplier is not assigned to this request")]
    NotAssigned,
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::forbidden(value.to_string())
    }
}

/// Decide whether `actor` holds `capability`.
///
/// `assigned_supplier` is the supplier party of the request being touched, or
/// `None` when no request exists yet (creation).
///
/// | capability | staff/admin | assigned supplier | anyone else |
/// |---|---|---|---|
/// | `CreateReorder` | yes | no | no |
/// | `ReadReorder`, `AnnotateReorder` | yes | yes | no |
/// | `SupplierTransition` | no | yes | no |
/// | `StaffTransition` | yes | no | no |
///
/// No IO and no panics.
pub fn authorize(
    actor: &Actor,
    capability: Capability,
    assigned_supplier: Option<AggregateId>,
) -> Result<(), AuthzError> {
    let is_assigned = assigned_supplier.is_some_and(|party| actor.acts_for(party));

    let allowed = match capability {
        Capability::CreateReorder | Capability::StaffTransition => actor.is_staff(),
        Capability::ReadReorder | Capability::AnnotateReorder => actor.is_staff() || is_assigned,
        Capability::SupplierTransition => is_assigned,
    };

    if allowed {
        return Ok(());
    }

    if actor.role == Role::Supplier && !is_assigned && capability != Capability::StaffTransition {
        return Err(AuthzError::NotAssigned);
    }

    Err(AuthzError::Forbidden {
        role: actor.role,
        capability,
    })
}
