//! `stockroom-auth`: actor identity and the capability check.
//!
//! Authentication happens elsewhere; this crate only decides whether an
//! already-identified actor may perform an operation. Decoupled from HTTP and
//! storage.

pub mod actor;
pub mod authorize;
pub mod capability;
pub mod roles;

pub use actor::Actor;
pub use authorize::{AuthzError, authorize};
pub use capability::Capability;
pub use roles::Role;
