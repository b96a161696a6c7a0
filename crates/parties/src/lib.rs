//! Parties domain module (customers and suppliers, event-sourced).
//!
//! Reorder requests are addressed to supplier parties; this crate owns the
//! rule that only active suppliers can receive them.

pub mod party;

pub use party::{
    ContactInfo, Party, PartyCommand, PartyDetailsChanged, PartyEvent, PartyId, PartyKind,
    PartyRegistered, PartyStatus, PartyStatusChanged, ReactivateParty, RegisterParty,
    SuspendParty, UpdateDetails,
};
