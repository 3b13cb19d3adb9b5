//! Services module
//!
//! This module contains the business operations, wired over a [`Store`],
//! a [`Notifier`] and a [`Clock`].

pub mod attendance;
pub mod clock;
pub mod event;
pub mod notification;
pub mod order;
pub mod registration;
pub mod ticket;

// Re-export commonly used services
pub use attendance::{AttendanceService, ScanOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{EventService, EventView};
pub use notification::{NotificationService, Notifier, TicketNotice};
pub use order::OrderService;
pub use registration::{OrderPlacement, RegistrationService};
pub use ticket::issue_ticket_id;

use std::sync::Arc;

use crate::database::Store;
use crate::models::{Actor, Event, Registration, Role, User};
use crate::utils::errors::{FelicityError, Result};

/// Engine bundling every service over shared collaborators
#[derive(Clone)]
pub struct Engine {
    pub events: EventService,
    pub registrations: RegistrationService,
    pub orders: OrderService,
    pub attendance: AttendanceService,
}

impl Engine {
    /// Create a new Engine with all services initialized
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: EventService::new(store.clone(), notifier.clone(), clock.clone()),
            registrations: RegistrationService::new(store.clone(), notifier.clone(), clock.clone()),
            orders: OrderService::new(store.clone(), notifier, clock.clone()),
            attendance: AttendanceService::new(store, clock),
        }
    }
}

pub(crate) fn require_organizer(actor: &Actor) -> Result<()> {
    if !actor.is_organizer() {
        return Err(FelicityError::Forbidden("Organizer role required".to_string()));
    }
    Ok(())
}

pub(crate) fn require_participant(actor: &Actor) -> Result<()> {
    if actor.role != Role::Participant {
        return Err(FelicityError::Forbidden("Participant role required".to_string()));
    }
    Ok(())
}

/// Load an event and check the caller organizes it
pub(crate) async fn owned_event(store: &dyn Store, actor: &Actor, event_id: i64) -> Result<Event> {
    let event = store
        .find_event(event_id)
        .await?
        .ok_or(FelicityError::EventNotFound { event_id })?;
    if !actor.is_organizer() || event.organizer_id != actor.user_id {
        return Err(FelicityError::Forbidden(format!(
            "User {} does not organize event {}",
            actor.user_id, event_id
        )));
    }
    Ok(event)
}

pub(crate) fn ticket_notice(participant: &User, event: &Event, registration: &Registration) -> Option<TicketNotice> {
    let ticket_id = registration.ticket_id.clone()?;
    Some(TicketNotice {
        participant_address: participant.email.clone(),
        participant_name: participant.display_name(),
        ticket_id,
        event_name: event.name.clone(),
    })
}
