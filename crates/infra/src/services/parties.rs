use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use stockroom_core::DomainError;
use stockroom_events::{EventBus, EventEnvelope};
use stockroom_parties::{
    ContactInfo, Party, PartyCommand, PartyId, PartyKind, ReactivateParty, RegisterParty,
    SuspendParty, UpdateDetails,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::streams;

/// Supplier and customer directory.
pub struct PartyService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> PartyService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }

    #[instrument(skip(self))]
    pub fn register(
        &self,
        party_id: PartyId,
        kind: PartyKind,
        name: String,
        contact: Option<ContactInfo>,
    ) -> Result<Party, DispatchError> {
        let party = self.run(
            party_id,
            PartyCommand::RegisterParty(RegisterParty {
                party_id,
                kind,
                name,
                contact,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%party_id, kind = ?party.kind(), "party registered");
        Ok(party)
    }

    #[instrument(skip(self))]
    pub fn update_details(
        &self,
        party_id: PartyId,
        name: Option<String>,
        contact: Option<ContactInfo>,
    ) -> Result<Party, DispatchError> {
        self.run(
            party_id,
            PartyCommand::UpdateDetails(UpdateDetails {
                party_id,
                name,
                contact,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// A suspended supplier cannot receive new reorder requests.
    #[instrument(skip(self))]
    pub fn suspend(&self, party_id: PartyId, reason: Option<String>) -> Result<Party, DispatchError> {
        let party = self.run(
            party_id,
            PartyCommand::SuspendParty(SuspendParty {
                party_id,
                reason,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%party_id, "party suspended");
        Ok(party)
    }

    #[instrument(skip(self))]
    pub fn reactivate(&self, party_id: PartyId) -> Result<Party, DispatchError> {
        let party = self.run(
            party_id,
            PartyCommand::ReactivateParty(ReactivateParty {
                party_id,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%party_id, "party reactivated");
        Ok(party)
    }

    pub fn get(&self, party_id: PartyId) -> Result<Party, DispatchError> {
        let party = self.load(party_id)?;
        if !party.is_registered() {
            return Err(DomainError::not_found(format!("party {party_id}")).into());
        }
        Ok(party)
    }

    /// Rehydrated party; unregistered ids come back empty rather than failing.
    pub(crate) fn load(&self, party_id: PartyId) -> Result<Party, DispatchError> {
        self.dispatcher
            .load(party_id.0, streams::PARTY, |id| Party::empty(PartyId::new(id)))
    }

    fn run(&self, party_id: PartyId, cmd: PartyCommand) -> Result<Party, DispatchError> {
        let dispatched = self.dispatcher.dispatch(party_id.0, streams::PARTY, &cmd, |id| {
            Party::empty(PartyId::new(id))
        })?;
        Ok(dispatched.aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{AggregateId, ErrorKind};
    use stockroom_events::InMemoryEventBus;
    use stockroom_parties::PartyStatus;

    use crate::event_store::InMemoryEventStore;

    fn service() -> PartyService<InMemoryEventStore, InMemoryEventBus<EventEnvelope<JsonValue>>> {
        PartyService::new(Arc::new(CommandDispatcher::new(
            InMemoryEventStore::new(),
            InMemoryEventBus::new(),
        )))
    }

    #[test]
    fn register_suspend_reactivate() {
        let svc = service();
        let id = PartyId::new(AggregateId::new());

        svc.register(id, PartyKind::Supplier, "Acme Supply".to_string(), None)
            .unwrap();
        assert!(svc.get(id).unwrap().ensure_active_supplier().is_ok());

        let suspended = svc.suspend(id, Some("late deliveries".to_string())).unwrap();
        assert_eq!(suspended.status(), PartyStatus::Suspended);
        assert!(suspended.ensure_active_supplier().is_err());

        let again = svc.suspend(id, None).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Conflict);

        assert!(svc.reactivate(id).unwrap().can_transact());
    }

    #[test]
    fn unknown_party_is_not_found() {
        let err = service().get(PartyId::new(AggregateId::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
