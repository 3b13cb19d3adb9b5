//! Registration service implementation
//!
//! Participant-facing entry points: registering for a normal event and
//! placing a merchandise order. Pure guards run first; the contended checks
//! are enforced by the store inside the ledger write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::database::Store;
use crate::lifecycle::guard;
use crate::models::{
    Actor, Event, EventKind, InsertGuard, NewRegistration, OrderLine, PaymentStatus, PlaceOrderRequest,
    RegisterRequest, Registration, User,
};
use crate::services::clock::Clock;
use crate::services::notification::{dispatch_ticket, Notifier};
use crate::services::ticket::issue_ticket_id;
use crate::services::{require_participant, ticket_notice};
use crate::utils::errors::{FelicityError, Result};
use crate::utils::logging::log_registration;

/// Result of placing a merchandise order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "registration", rename_all = "snake_case")]
pub enum OrderPlacement {
    /// Stock taken and ticket issued
    Confirmed(Registration),
    /// Waiting for payment proof and organizer approval
    AwaitingApproval(Registration),
}

impl OrderPlacement {
    pub fn registration(&self) -> &Registration {
        match self {
            OrderPlacement::Confirmed(registration) | OrderPlacement::AwaitingApproval(registration) => registration,
        }
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self { store, notifier, clock }
    }

    /// Register for a normal event; the returned registration carries the ticket
    pub async fn register(&self, actor: &Actor, request: RegisterRequest) -> Result<Registration> {
        require_participant(actor)?;
        let event = self.load_event(request.event_id).await?;
        let now = self.clock.now();

        guard::check_kind(&event, EventKind::Normal)?;
        guard::check_registration_window(&event, now)?;
        guard::check_eligibility(event.eligibility, actor.category)?;
        guard::validate_form_answers(&event, &request.form_answers)?;
        let participant = self.load_participant(actor).await?;

        let registration = self
            .store
            .insert_registration(
                NewRegistration {
                    event_id: event.id,
                    participant_id: actor.user_id,
                    ticket_id: Some(issue_ticket_id(now)),
                    form_answers: request.form_answers,
                    order: None,
                    payment_status: PaymentStatus::NotApplicable,
                },
                InsertGuard::Capacity,
            )
            .await?;

        log_registration(registration.id, event.id, actor.user_id, "registration");
        if let Some(notice) = ticket_notice(&participant, &event, &registration) {
            dispatch_ticket(self.notifier.clone(), notice);
        }
        Ok(registration)
    }

    /// Place a merchandise order, confirmed immediately unless the event requires approval
    pub async fn place_order(&self, actor: &Actor, request: PlaceOrderRequest) -> Result<OrderPlacement> {
        require_participant(actor)?;
        let event = self.load_event(request.event_id).await?;
        let now = self.clock.now();

        guard::check_kind(&event, EventKind::Merchandise)?;
        guard::check_registration_window(&event, now)?;
        guard::check_eligibility(event.eligibility, actor.category)?;
        let already_ordered = self.store.ordered_quantity(event.id, actor.user_id).await?;
        let variant = guard::check_order(&event, request.variant_id, request.quantity, already_ordered)?;
        let participant = self.load_participant(actor).await?;

        let line = OrderLine { variant_id: variant.id, quantity: request.quantity };
        if event.requires_payment_approval {
            let registration = self
                .store
                .insert_registration(
                    NewRegistration {
                        event_id: event.id,
                        participant_id: actor.user_id,
                        ticket_id: None,
                        form_answers: Default::default(),
                        order: Some(line),
                        payment_status: PaymentStatus::Pending,
                    },
                    InsertGuard::Deferred,
                )
                .await?;
            log_registration(registration.id, event.id, actor.user_id, "pending_order");
            return Ok(OrderPlacement::AwaitingApproval(registration));
        }

        guard::check_stock(variant, request.quantity)?;
        let registration = self
            .store
            .insert_registration(
                NewRegistration {
                    event_id: event.id,
                    participant_id: actor.user_id,
                    ticket_id: Some(issue_ticket_id(now)),
                    form_answers: Default::default(),
                    order: Some(line),
                    payment_status: PaymentStatus::Approved,
                },
                InsertGuard::DecrementStock,
            )
            .await?;

        log_registration(registration.id, event.id, actor.user_id, "order");
        if let Some(notice) = ticket_notice(&participant, &event, &registration) {
            dispatch_ticket(self.notifier.clone(), notice);
        }
        Ok(OrderPlacement::Confirmed(registration))
    }

    /// The calling participant's registrations and orders, newest first
    pub async fn my_registrations(&self, actor: &Actor) -> Result<Vec<Registration>> {
        let mut registrations = self.store.list_participant_registrations(actor.user_id).await?;
        registrations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(registrations)
    }

    async fn load_event(&self, event_id: i64) -> Result<Event> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(FelicityError::EventNotFound { event_id })
    }

    async fn load_participant(&self, actor: &Actor) -> Result<User> {
        self.store
            .find_user(actor.user_id)
            .await?
            .ok_or(FelicityError::UserNotFound { user_id: actor.user_id })
    }
}
