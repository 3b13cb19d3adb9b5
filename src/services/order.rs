//! Order approval workflow
//!
//! Pending -> Approved | Rejected for approval-gated merchandise orders.
//! Proof may be attached only while Pending. Approval re-validates stock and
//! issues the ticket in the same store call; pending orders of an event that
//! is Completed or Closed are rejected rather than left unreachable.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{info, warn};

use crate::database::Store;
use crate::models::{Actor, EventStatus, OrderDecision, PaymentStatus, Registration};
use crate::services::clock::Clock;
use crate::services::notification::{dispatch_ticket, Notifier};
use crate::services::ticket::issue_ticket_id;
use crate::services::{owned_event, ticket_notice};
use crate::utils::errors::{FelicityError, Result};
use crate::utils::logging::log_event_action;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self { store, notifier, clock }
    }

    /// Attach a payment proof reference to the caller's own pending order
    pub async fn attach_payment_proof(&self, actor: &Actor, registration_id: i64, proof_url: &str) -> Result<Registration> {
        let proof_url = proof_url.trim();
        if proof_url.is_empty() {
            return Err(FelicityError::InvalidInput("Payment proof reference is required".to_string()));
        }

        let order = self.load_order(registration_id).await?;
        if order.participant_id != actor.user_id {
            return Err(FelicityError::Forbidden("Only the buyer can attach a payment proof".to_string()));
        }

        let order = self.store.attach_payment_proof(registration_id, proof_url).await?;
        info!(registration_id = registration_id, event_id = order.event_id, "Payment proof attached");
        Ok(order)
    }

    /// Approve a pending order; the returned registration carries the ticket
    pub async fn approve_order(&self, actor: &Actor, registration_id: i64) -> Result<Registration> {
        let order = self.load_order(registration_id).await?;
        let event = owned_event(self.store.as_ref(), actor, order.event_id).await?;
        if order.payment_status != PaymentStatus::Pending {
            return Err(FelicityError::transition(order.payment_status, PaymentStatus::Approved));
        }

        let now = self.clock.now();
        let status = event.effective_status(now);
        if !status.accepts_registrations() {
            return Err(FelicityError::InvalidPhase { status, operation: "approve order" });
        }

        let approved = self
            .store
            .decide_order(registration_id, OrderDecision::Approve { ticket_id: issue_ticket_id(now) })
            .await?;
        log_event_action(event.id, "approve_order", actor.user_id, Some(&registration_id.to_string()));

        match self.store.find_user(approved.participant_id).await {
            Ok(Some(participant)) => {
                if let Some(notice) = ticket_notice(&participant, &event, &approved) {
                    dispatch_ticket(self.notifier.clone(), notice);
                }
            }
            Ok(None) => warn!(registration_id = registration_id, "Buyer vanished before ticket mail"),
            Err(e) => warn!(registration_id = registration_id, error = %e, "Could not load buyer for ticket mail"),
        }
        Ok(approved)
    }

    /// Reject a pending order; no stock or ticket side effects
    pub async fn reject_order(&self, actor: &Actor, registration_id: i64) -> Result<Registration> {
        let order = self.load_order(registration_id).await?;
        let event = owned_event(self.store.as_ref(), actor, order.event_id).await?;

        let rejected = self.store.decide_order(registration_id, OrderDecision::Reject).await?;
        log_event_action(event.id, "reject_order", actor.user_id, Some(&registration_id.to_string()));
        Ok(rejected)
    }

    /// Reject pending orders of every event that is Completed or Closed
    pub async fn sweep_stale_orders(&self) -> Result<u64> {
        let now = self.clock.now();
        let stale: Vec<(i64, EventStatus)> = self
            .store
            .list_events_with_pending_orders()
            .await?
            .iter()
            .map(|event| (event.id, event.effective_status(now)))
            .filter(|(_, status)| matches!(status, EventStatus::Completed | EventStatus::Closed))
            .collect();

        let counts = try_join_all(stale.into_iter().map(|(event_id, status)| async move {
            let rejected = self.store.reject_pending_orders(event_id).await?;
            if rejected > 0 {
                info!(event_id = event_id, rejected = rejected, status = %status, "Rejected stale pending orders");
            }
            Ok::<_, FelicityError>(rejected)
        }))
        .await?;

        Ok(counts.into_iter().sum())
    }

    async fn load_order(&self, registration_id: i64) -> Result<Registration> {
        let registration = self
            .store
            .find_registration(registration_id)
            .await?
            .ok_or(FelicityError::RegistrationNotFound { registration_id })?;
        if !registration.is_order() {
            return Err(FelicityError::InvalidInput(format!(
                "Registration {} is not a merchandise order",
                registration_id
            )));
        }
        Ok(registration)
    }
}
