use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use stockroom_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Where a party can be reached; `email` is the notification address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    fn normalized(mut self) -> Self {
        fn clean(field: Option<String>) -> Option<String> {
            field
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        self.email = clean(self.email).map(|e| e.to_lowercase());
        self.phone = clean(self.phone);
        self.address = clean(self.address);
        self
    }
}

/// A supplier or customer in the directory.
///
/// Suppliers are the counterparty of reorder requests; customers only ever
/// appear as actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    status: PartyStatus,
    suspension_reason: Option<String>,
    version: u64,
    registered: bool,
}

impl Party {
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            kind: PartyKind::Customer,
            name: String::new(),
            contact: ContactInfo::default(),
            status: PartyStatus::Active,
            suspension_reason: None,
            version: 0,
            registered: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn notification_email(&self) -> Option<&str> {
        self.contact.email.as_deref()
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    pub fn suspension_reason(&self) -> Option<&str> {
        self.suspension_reason.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn can_transact(&self) -> bool {
        self.registered && self.status == PartyStatus::Active
    }

    /// Gate for addressing a reorder request to this party.
    pub fn ensure_active_supplier(&self) -> Result<(), DomainError> {
        if !self.registered {
            return Err(DomainError::not_found(format!("supplier {}", self.id)));
        }
        if self.kind != PartyKind::Supplier {
            return Err(DomainError::validation(format!(
                "party {} is not a supplier",
                self.id
            )));
        }
        match self.status {
            PartyStatus::Active => Ok(()),
            PartyStatus::Suspended => Err(DomainError::validation(format!(
                "supplier {} is suspended",
                self.id
            ))),
        }
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// `None` fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub party_id: PartyId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateParty {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    SuspendParty(SuspendParty),
    ReactivateParty(ReactivateParty),
}

impl PartyCommand {
    fn party_id(&self) -> PartyId {
        match self {
            PartyCommand::RegisterParty(c) => c.party_id,
            PartyCommand::UpdateDetails(c) => c.party_id,
            PartyCommand::SuspendParty(c) => c.party_id,
            PartyCommand::ReactivateParty(c) => c.party_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Carries the full resulting name and contact, not a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetailsChanged {
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyStatusChanged {
    pub party_id: PartyId,
    pub from: PartyStatus,
    pub to: PartyStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyDetailsChanged(PartyDetailsChanged),
    PartyStatusChanged(PartyStatusChanged),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyDetailsChanged(_) => "parties.party.details_changed",
            PartyEvent::PartyStatusChanged(_) => "parties.party.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyDetailsChanged(e) => e.occurred_at,
            PartyEvent::PartyStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.kind = e.kind;
                self.name.clone_from(&e.name);
                self.contact = e.contact.clone();
                self.status = PartyStatus::Active;
                self.registered = true;
            }
            PartyEvent::PartyDetailsChanged(e) => {
                self.name.clone_from(&e.name);
                self.contact = e.contact.clone();
            }
            PartyEvent::PartyStatusChanged(e) => {
                self.status = e.to;
                self.suspension_reason = match e.to {
                    PartyStatus::Suspended => e.reason.clone(),
                    PartyStatus::Active => None,
                };
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let event = match command {
            PartyCommand::RegisterParty(cmd) => self.register(cmd)?,
            PartyCommand::UpdateDetails(cmd) => {
                self.ensure_existing(command.party_id())?;
                self.change_details(cmd)?
            }
            PartyCommand::SuspendParty(cmd) => {
                self.ensure_existing(command.party_id())?;
                self.change_status(PartyStatus::Suspended, cmd.reason.clone(), cmd.occurred_at)?
            }
            PartyCommand::ReactivateParty(cmd) => {
                self.ensure_existing(command.party_id())?;
                self.change_status(PartyStatus::Active, None, cmd.occurred_at)?
            }
        };
        Ok(vec![event])
    }
}

fn required_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(name.to_string())
}

impl Party {
    fn ensure_existing(&self, party_id: PartyId) -> Result<(), DomainError> {
        if !self.registered {
            return Err(DomainError::not_found(format!("party {party_id}")));
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn register(&self, cmd: &RegisterParty) -> Result<PartyEvent, DomainError> {
        if self.registered {
            return Err(DomainError::conflict(format!(
                "party {} already exists",
                cmd.party_id
            )));
        }

        Ok(PartyEvent::PartyRegistered(PartyRegistered {
            party_id: cmd.party_id,
            kind: cmd.kind,
            name: required_name(&cmd.name)?,
            contact: cmd.contact.clone().unwrap_or_default().normalized(),
            occurred_at: cmd.occurred_at,
        }))
    }

    fn change_details(&self, cmd: &UpdateDetails) -> Result<PartyEvent, DomainError> {
        let name = match &cmd.name {
            Some(name) => required_name(name)?,
            None => self.name.clone(),
        };
        let contact = match &cmd.contact {
            Some(contact) => contact.clone().normalized(),
            None => self.contact.clone(),
        };

        Ok(PartyEvent::PartyDetailsChanged(PartyDetailsChanged {
            party_id: self.id,
            name,
            contact,
            occurred_at: cmd.occurred_at,
        }))
    }

    fn change_status(
        &self,
        to: PartyStatus,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<PartyEvent, DomainError> {
        if self.status == to {
            return Err(DomainError::conflict(format!(
                "party {} is already {}",
                self.id,
                match to {
                    PartyStatus::Active => "active",
                    PartyStatus::Suspended => "suspended",
                }
            )));
        }

        Ok(PartyEvent::PartyStatusChanged(PartyStatusChanged {
            party_id: self.id,
            from: self.status,
            to,
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            occurred_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_events::execute;

    fn supplier_with_email(kind: PartyKind) -> Party {
        let party_id = PartyId::new(AggregateId::new());
        let mut party = Party::empty(party_id);
        execute(
            &mut party,
            &PartyCommand::RegisterParty(RegisterParty {
                party_id,
                kind,
                name: "  Acme Supplies ".to_string(),
                contact: Some(ContactInfo {
                    email: Some(" Orders@Acme.test".to_string()),
                    phone: Some("   ".to_string()),
                    address: None,
                }),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        party
    }

    fn suspend(party: &mut Party, reason: Option<&str>) -> Result<(), DomainError> {
        let cmd = PartyCommand::SuspendParty(SuspendParty {
            party_id: party.id_typed(),
            reason: reason.map(str::to_string),
            occurred_at: Utc::now(),
        });
        execute(party, &cmd).map(|_| ())
    }

    #[test]
    fn registration_normalizes_name_and_contact() {
        let party = supplier_with_email(PartyKind::Supplier);
        assert_eq!(party.name(), "Acme Supplies");
        assert_eq!(party.notification_email(), Some("orders@acme.test"));
        assert_eq!(party.contact().phone, None);
        assert!(party.ensure_active_supplier().is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        let party_id = PartyId::new(AggregateId::new());
        let err = Party::empty(party_id)
            .handle(&PartyCommand::RegisterParty(RegisterParty {
                party_id,
                kind: PartyKind::Supplier,
                name: "   ".to_string(),
                contact: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn commands_on_unregistered_party_are_not_found() {
        let party_id = PartyId::new(AggregateId::new());
        let mut party = Party::empty(party_id);
        assert!(matches!(suspend(&mut party, None), Err(DomainError::NotFound(_))));
        assert!(matches!(
            party.ensure_active_supplier(),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn customers_cannot_receive_reorders() {
        let party = supplier_with_email(PartyKind::Customer);
        let err = party.ensure_active_supplier().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("not a supplier")));
    }

    #[test]
    fn suspension_keeps_reason_until_reactivated() {
        let mut party = supplier_with_email(PartyKind::Supplier);
        suspend(&mut party, Some(" late deliveries ")).unwrap();
        assert_eq!(party.suspension_reason(), Some("late deliveries"));
        assert!(!party.can_transact());
        assert!(matches!(
            party.ensure_active_supplier(),
            Err(DomainError::Validation(msg)) if msg.contains("suspended")
        ));
        assert!(matches!(suspend(&mut party, None), Err(DomainError::Conflict(_))));

        let cmd = PartyCommand::ReactivateParty(ReactivateParty {
            party_id: party.id_typed(),
            occurred_at: Utc::now(),
        });
        let events = execute(&mut party, &cmd).unwrap();
        assert!(matches!(
            &events[0],
            PartyEvent::PartyStatusChanged(e)
                if e.from == PartyStatus::Suspended && e.to == PartyStatus::Active
        ));
        assert_eq!(party.suspension_reason(), None);
        assert!(party.ensure_active_supplier().is_ok());
        assert_eq!(party.version(), 3);
    }

    #[test]
    fn partial_update_keeps_contact() {
        let mut party = supplier_with_email(PartyKind::Supplier);
        let cmd = PartyCommand::UpdateDetails(UpdateDetails {
            party_id: party.id_typed(),
            name: Some("Acme Wholesale".to_string()),
            contact: None,
            occurred_at: Utc::now(),
        });
        execute(&mut party, &cmd).unwrap();
        assert_eq!(party.name(), "Acme Wholesale");
        assert_eq!(party.notification_email(), Some("orders@acme.test"));
    }
}
