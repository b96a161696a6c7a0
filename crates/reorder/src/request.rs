use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use stockroom_auth::{Actor, Capability, authorize};
use stockroom_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use stockroom_events::Event;
use stockroom_inventory::ProductId;
use stockroom_parties::PartyId;

use crate::status::{ReorderStatus, Urgency};
use crate::timeline::{Note, TimelineAction, TimelineEntry};

/// Reorder request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReorderRequestId(pub AggregateId);

impl ReorderRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReorderRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Price and delivery estimates a supplier may attach to a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierEstimate {
    /// Minor currency units for the whole request.
    pub estimated_price: Option<i64>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl SupplierEstimate {
    pub fn is_empty(&self) -> bool {
        self.estimated_price.is_none() && self.estimated_delivery.is_none()
    }
}

/// The assigned supplier's latest answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierResponse {
    pub message: String,
    pub estimated_price: Option<i64>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub responded_at: DateTime<Utc>,
}

/// Aggregate root: ReorderRequest.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderRequest {
    id: ReorderRequestId,
    product_id: Option<ProductId>,
    supplier_id: Option<PartyId>,
    requested_by: Option<UserId>,
    quantity: i64,
    urgency: Urgency,
    status: ReorderStatus,
    message: String,
    expected_delivery_date: Option<DateTime<Utc>>,
    actual_delivery_date: Option<DateTime<Utc>>,
    supplier_response: Option<SupplierResponse>,
    timeline: Vec<TimelineEntry>,
    notes: Vec<Note>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl ReorderRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ReorderRequestId) -> Self {
        Self {
            id,
            product_id: None,
            supplier_id: None,
            requested_by: None,
            quantity: 0,
            urgency: Urgency::default(),
            status: ReorderStatus::Pending,
            message: String::new(),
            expected_delivery_date: None,
            actual_delivery_date: None,
            supplier_response: None,
            timeline: Vec::new(),
            notes: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReorderRequestId {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn status(&self) -> ReorderStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn expected_delivery_date(&self) -> Option<DateTime<Utc>> {
        self.expected_delivery_date
    }

    pub fn actual_delivery_date(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery_date
    }

    pub fn supplier_response(&self) -> Option<&SupplierResponse> {
        self.supplier_response.as_ref()
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Staff, or the assigned supplier, may read this request.
    pub fn ensure_readable_by(&self, actor: &Actor) -> Result<(), DomainError> {
        self.ensure_created()?;
        self.check(actor, Capability::ReadReorder)
    }
}

impl AggregateRoot for ReorderRequest {
    type Id = ReorderRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateReorderRequest.
///
/// Product existence and supplier activity are checked by the caller, which
/// has access to those aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReorderRequest {
    pub request_id: ReorderRequestId,
    pub product_id: ProductId,
    pub supplier_id: PartyId,
    pub quantity: i64,
    pub urgency: Urgency,
    pub message: String,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub requested_by: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateReorderStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReorderStatus {
    pub request_id: ReorderRequestId,
    pub status: ReorderStatus,
    pub actor: Actor,
    pub message: Option<String>,
    pub estimate: Option<SupplierEstimate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddReorderNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReorderNote {
    pub request_id: ReorderRequestId,
    pub actor: Actor,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderCommand {
    Create(CreateReorderRequest),
    UpdateStatus(UpdateReorderStatus),
    AddNote(AddReorderNote),
}

/// Event: ReorderRequested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRequested {
    pub request_id: ReorderRequestId,
    pub product_id: ProductId,
    pub supplier_id: PartyId,
    pub requested_by: UserId,
    pub quantity: i64,
    pub urgency: Urgency,
    pub message: String,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub entry: TimelineEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderStatusChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderStatusChanged {
    pub request_id: ReorderRequestId,
    pub supplier_id: PartyId,
    pub from: ReorderStatus,
    pub to: ReorderStatus,
    pub actor: UserId,
    pub supplier_response: Option<SupplierResponse>,
    pub entry: TimelineEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderNoteAdded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderNoteAdded {
    pub request_id: ReorderRequestId,
    pub note: Note,
    pub entry: TimelineEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Every variant carries exactly one timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReorderEvent {
    ReorderRequested(ReorderRequested),
    ReorderStatusChanged(ReorderStatusChanged),
    ReorderNoteAdded(ReorderNoteAdded),
}

impl ReorderEvent {
    pub fn request_id(&self) -> ReorderRequestId {
        match self {
            ReorderEvent::ReorderRequested(e) => e.request_id,
            ReorderEvent::ReorderStatusChanged(e) => e.request_id,
            ReorderEvent::ReorderNoteAdded(e) => e.request_id,
        }
    }

    pub fn entry(&self) -> &TimelineEntry {
        match self {
            ReorderEvent::ReorderRequested(e) => &e.entry,
            ReorderEvent::ReorderStatusChanged(e) => &e.entry,
            ReorderEvent::ReorderNoteAdded(e) => &e.entry,
        }
    }
}

impl Event for ReorderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReorderEvent::ReorderRequested(_) => "reorder.request.created",
            ReorderEvent::ReorderStatusChanged(_) => "reorder.request.status_changed",
            ReorderEvent::ReorderNoteAdded(_) => "reorder.request.note_added",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReorderEvent::ReorderRequested(e) => e.occurred_at,
            ReorderEvent::ReorderStatusChanged(e) => e.occurred_at,
            ReorderEvent::ReorderNoteAdded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReorderRequest {
    type Command = ReorderCommand;
    type Event = ReorderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReorderEvent::ReorderRequested(e) => {
                self.id = e.request_id;
                self.product_id = Some(e.product_id);
                self.supplier_id = Some(e.supplier_id);
                self.requested_by = Some(e.requested_by);
                self.quantity = e.quantity;
                self.urgency = e.urgency;
                self.status = ReorderStatus::Pending;
                self.message = e.message.clone();
                self.expected_delivery_date = e.expected_delivery_date;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ReorderEvent::ReorderStatusChanged(e) => {
                self.status = e.to;
                if let Some(response) = &e.supplier_response {
                    if response.estimated_delivery.is_some() {
                        self.expected_delivery_date = response.estimated_delivery;
                    }
                    self.supplier_response = Some(response.clone());
                }
                if e.to == ReorderStatus::Delivered {
                    self.actual_delivery_date = Some(e.occurred_at);
                }
            }
            ReorderEvent::ReorderNoteAdded(e) => {
                self.notes.push(e.note.clone());
            }
        }

        self.timeline.push(event.entry().clone());
        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReorderCommand::Create(cmd) => self.handle_create(cmd),
            ReorderCommand::UpdateStatus(cmd) => self.handle_update_status(cmd),
            ReorderCommand::AddNote(cmd) => self.handle_add_note(cmd),
        }
    }
}

impl ReorderRequest {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("reorder request {}", self.id)));
        }
        Ok(())
    }

    fn ensure_same_request(&self, request_id: ReorderRequestId) -> Result<(), DomainError> {
        self.ensure_created()?;
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn check(&self, actor: &Actor, capability: Capability) -> Result<(), DomainError> {
        authorize(actor, capability, self.supplier_id.map(|s| s.0))?;
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateReorderRequest) -> Result<Vec<ReorderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("reorder request already exists"));
        }
        authorize(&cmd.requested_by, Capability::CreateReorder, None)?;
        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        let message = cmd.message.trim().to_string();
        let entry = TimelineEntry {
            action: TimelineAction::RequestCreated,
            actor: cmd.requested_by.user_id,
            message: format!("Reorder of {} units requested", cmd.quantity),
            timestamp: cmd.occurred_at,
            metadata: json!({
                "quantity": cmd.quantity,
                "urgency": cmd.urgency,
                "supplier_id": cmd.supplier_id,
            }),
        };

        Ok(vec![ReorderEvent::ReorderRequested(ReorderRequested {
            request_id: cmd.request_id,
            product_id: cmd.product_id,
            supplier_id: cmd.supplier_id,
            requested_by: cmd.requested_by.user_id,
            quantity: cmd.quantity,
            urgency: cmd.urgency,
            message,
            expected_delivery_date: cmd.expected_delivery_date,
            entry,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Participant first, then the transition table, then the role for the
    /// target status. An outsider never learns which moves are legal.
    fn handle_update_status(
        &self,
        cmd: &UpdateReorderStatus,
    ) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_same_request(cmd.request_id)?;
        self.check(&cmd.actor, Capability::ReadReorder)?;

        let (from, to) = (self.status, cmd.status);
        if !from.can_transition_to(to) {
            return Err(DomainError::invalid_transition(from, to));
        }
        let capability = to
            .required_capability()
            .ok_or_else(|| DomainError::invalid_transition(from, to))?;
        self.check(&cmd.actor, capability)?;

        let message = cmd
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Status changed from {from} to {to}"));

        let supplier_response = cmd
            .estimate
            .filter(|e| to.is_supplier_response() && !e.is_empty())
            .map(|e| SupplierResponse {
                message: message.clone(),
                estimated_price: e.estimated_price,
                estimated_delivery: e.estimated_delivery,
                responded_at: cmd.occurred_at,
            });

        let mut metadata = json!({ "from": from, "to": to });
        if let Some(response) = &supplier_response {
            metadata["estimated_price"] = json!(response.estimated_price);
            metadata["estimated_delivery"] = json!(response.estimated_delivery);
        }

        let supplier_id = self
            .supplier_id
            .ok_or_else(|| DomainError::invariant("reorder request has no supplier"))?;

        Ok(vec![ReorderEvent::ReorderStatusChanged(ReorderStatusChanged {
            request_id: cmd.request_id,
            supplier_id,
            from,
            to,
            actor: cmd.actor.user_id,
            supplier_response,
            entry: TimelineEntry {
                action: TimelineAction::StatusChanged,
                actor: cmd.actor.user_id,
                message,
                timestamp: cmd.occurred_at,
                metadata,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_note(&self, cmd: &AddReorderNote) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_same_request(cmd.request_id)?;
        self.check(&cmd.actor, Capability::AnnotateReorder)?;

        let message = cmd.message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("note message cannot be empty"));
        }

        Ok(vec![ReorderEvent::ReorderNoteAdded(ReorderNoteAdded {
            request_id: cmd.request_id,
            note: Note {
                actor: cmd.actor.user_id,
                message: message.to_string(),
                created_at: cmd.occurred_at,
            },
            entry: TimelineEntry {
                action: TimelineAction::NoteAdded,
                actor: cmd.actor.user_id,
                message: message.to_string(),
                timestamp: cmd.occurred_at,
                metadata: serde_json::Value::Null,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockroom_events::execute;

    struct Fixture {
        request: ReorderRequest,
        staff: Actor,
        supplier: Actor,
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created() -> Fixture {
        let supplier_party = AggregateId::new();
        let staff = Actor::staff(UserId::new());
        let supplier = Actor::supplier(UserId::new(), supplier_party);
        let request_id = ReorderRequestId::new(AggregateId::new());
        let mut request = ReorderRequest::empty(request_id);

        execute(
            &mut request,
            &ReorderCommand::Create(CreateReorderRequest {
                request_id,
                product_id: ProductId::new(AggregateId::new()),
                supplier_id: PartyId::new(supplier_party),
                quantity: 24,
                urgency: Urgency::High,
                message: " running low before the weekend ".to_string(),
                expected_delivery_date: None,
                requested_by: staff.clone(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        Fixture {
            request,
            staff,
            supplier,
        }
    }

    fn update(
        request: &ReorderRequest,
        actor: &Actor,
        status: ReorderStatus,
    ) -> ReorderCommand {
        ReorderCommand::UpdateStatus(UpdateReorderStatus {
            request_id: request.id_typed(),
            status,
            actor: actor.clone(),
            message: None,
            estimate: None,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_starts_pending_with_one_timeline_entry() {
        let f = created();
        assert_eq!(f.request.status(), ReorderStatus::Pending);
        assert_eq!(f.request.quantity(), 24);
        assert_eq!(f.request.message(), "running low before the weekend");
        assert_eq!(f.request.timeline().len(), 1);
        assert_eq!(f.request.timeline()[0].action, TimelineAction::RequestCreated);
        assert_eq!(f.request.requested_by(), Some(f.staff.user_id));
    }

    #[test]
    fn create_requires_staff_and_positive_quantity() {
        let request_id = ReorderRequestId::new(AggregateId::new());
        let request = ReorderRequest::empty(request_id);
        let mut cmd = CreateReorderRequest {
            request_id,
            product_id: ProductId::new(AggregateId::new()),
            supplier_id: PartyId::new(AggregateId::new()),
            quantity: 0,
            urgency: Urgency::Low,
            message: String::new(),
            expected_delivery_date: None,
            requested_by: Actor::staff(UserId::new()),
            occurred_at: test_time(),
        };
        assert!(matches!(
            request.handle(&ReorderCommand::Create(cmd.clone())),
            Err(DomainError::Validation(_))
        ));

        cmd.quantity = 5;
        cmd.requested_by = Actor::customer(UserId::new());
        assert!(matches!(
            request.handle(&ReorderCommand::Create(cmd)),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn supplier_cannot_skip_straight_to_shipped() {
        let f = created();
        let before = f.request.clone();

        let err = f
            .request
            .handle(&update(&f.request, &f.supplier, ReorderStatus::Shipped))
            .unwrap_err();

        assert_eq!(
            err,
            DomainError::invalid_transition(ReorderStatus::Pending, ReorderStatus::Shipped)
        );
        assert_eq!(f.request, before);
    }

    #[test]
    fn full_lifecycle_ends_terminal_on_delivery() {
        let mut f = created();
        let delivered_at = test_time();

        for status in [
            ReorderStatus::Acknowledged,
            ReorderStatus::InProgress,
            ReorderStatus::Shipped,
        ] {
            let cmd = update(&f.request, &f.supplier, status);
            execute(&mut f.request, &cmd).unwrap();
        }
        let before = f.request.timeline().len();

        let cmd = ReorderCommand::UpdateStatus(UpdateReorderStatus {
            request_id: f.request.id_typed(),
            status: ReorderStatus::Delivered,
            actor: f.staff.clone(),
            message: Some("received in full".to_string()),
            estimate: None,
            occurred_at: delivered_at,
        });
        execute(&mut f.request, &cmd).unwrap();

        assert_eq!(f.request.status(), ReorderStatus::Delivered);
        assert_eq!(f.request.timeline().len(), before + 1);
        assert_eq!(f.request.actual_delivery_date(), Some(delivered_at));
        assert!(f.request.status().is_terminal());

        for status in ReorderStatus::ALL {
            assert!(f.request.handle(&update(&f.request, &f.staff, status)).is_err());
        }
    }

    #[test]
    fn supplier_moves_are_supplier_only_and_staff_moves_staff_only() {
        let mut f = created();

        assert!(matches!(
            f.request
                .handle(&update(&f.request, &f.staff, ReorderStatus::Acknowledged)),
            Err(DomainError::Forbidden(_))
        ));

        let cmd = update(&f.request, &f.supplier, ReorderStatus::Acknowledged);
        execute(&mut f.request, &cmd).unwrap();

        assert!(matches!(
            f.request
                .handle(&update(&f.request, &f.supplier, ReorderStatus::Rejected)),
            Err(DomainError::Forbidden(_))
        ));
        assert!(
            f.request
                .handle(&update(&f.request, &f.staff, ReorderStatus::Rejected))
                .is_ok()
        );
    }

    #[test]
    fn unrelated_supplier_is_forbidden_before_the_table_is_consulted() {
        let f = created();
        let stranger = Actor::supplier(UserId::new(), AggregateId::new());

        let err = f
            .request
            .handle(&update(&f.request, &stranger, ReorderStatus::Shipped))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn supplier_estimate_becomes_response_and_moves_expected_date() {
        let mut f = created();
        let eta = test_time() + Duration::days(5);

        let cmd = ReorderCommand::UpdateStatus(UpdateReorderStatus {
            request_id: f.request.id_typed(),
            status: ReorderStatus::Acknowledged,
            actor: f.supplier.clone(),
            message: Some("can do by Friday".to_string()),
            estimate: Some(SupplierEstimate {
                estimated_price: Some(48_000),
                estimated_delivery: Some(eta),
            }),
            occurred_at: test_time(),
        });
        execute(&mut f.request, &cmd).unwrap();

        let response = f.request.supplier_response().unwrap();
        assert_eq!(response.message, "can do by Friday");
        assert_eq!(response.estimated_price, Some(48_000));
        assert_eq!(f.request.expected_delivery_date(), Some(eta));
        assert_eq!(f.request.timeline()[1].metadata["estimated_price"], 48_000);
    }

    #[test]
    fn notes_append_to_notes_and_timeline() {
        let mut f = created();

        let cmd = ReorderCommand::AddNote(AddReorderNote {
            request_id: f.request.id_typed(),
            actor: f.supplier.clone(),
            message: "pallet size is 12".to_string(),
            occurred_at: test_time(),
        });
        execute(&mut f.request, &cmd).unwrap();

        assert_eq!(f.request.status(), ReorderStatus::Pending);
        assert_eq!(f.request.notes().len(), 1);
        assert_eq!(f.request.timeline().len(), 2);
        assert_eq!(f.request.timeline()[1].action, TimelineAction::NoteAdded);

        let empty = f.request.handle(&ReorderCommand::AddNote(AddReorderNote {
            request_id: f.request.id_typed(),
            actor: f.staff.clone(),
            message: "   ".to_string(),
            occurred_at: test_time(),
        }));
        assert!(matches!(empty, Err(DomainError::Validation(_))));
    }

    #[test]
    fn read_access_is_staff_or_assigned_supplier() {
        let f = created();
        assert!(f.request.ensure_readable_by(&f.staff).is_ok());
        assert!(f.request.ensure_readable_by(&f.supplier).is_ok());
        assert!(
            f.request
                .ensure_readable_by(&Actor::customer(UserId::new()))
                .is_err()
        );

        let missing = ReorderRequest::empty(ReorderRequestId::new(AggregateId::new()));
        assert!(matches!(
            missing.ensure_readable_by(&f.staff),
            Err(DomainError::NotFound(_))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_status() -> impl Strategy<Value = ReorderStatus> {
            prop::sample::select(ReorderStatus::ALL.to_vec())
        }

        proptest! {
            /// Property: any sequence of status requests either succeeds by
            /// following the table (timeline +1) or fails leaving the request
            /// untouched.
            #[test]
            fn transitions_follow_the_table(targets in prop::collection::vec((any_status(), any::<bool>()), 1..20)) {
                let mut f = created();

                for (to, as_supplier) in targets {
                    let actor = if as_supplier { f.supplier.clone() } else { f.staff.clone() };
                    let before = f.request.clone();
                    let cmd = update(&f.request, &actor, to);

                    match execute(&mut f.request, &cmd) {
                        Ok(_) => {
                            prop_assert!(before.status().can_transition_to(to));
                            prop_assert_eq!(f.request.status(), to);
                            prop_assert_eq!(f.request.timeline().len(), before.timeline().len() + 1);
                        }
                        Err(DomainError::InvalidTransition { .. }) => {
                            prop_assert!(!before.status().can_transition_to(to));
                            prop_assert_eq!(&f.request, &before);
                        }
                        Err(_) => {
                            prop_assert_eq!(&f.request, &before);
                        }
                    }
                }
            }
        }
    }
}
