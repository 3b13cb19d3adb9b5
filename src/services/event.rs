//! Event service implementation
//!
//! Organizer-facing event management: creation, phase-aware edits, draft
//! deletion, queries, and organizer account removal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::database::Store;
use crate::lifecycle::{edit_policy, guard};
use crate::models::{Actor, CreateEventRequest, Event, EventStatus, NewEvent, UpdateEventRequest};
use crate::services::clock::Clock;
use crate::services::notification::{dispatch_announcement, Notifier};
use crate::services::{owned_event, require_organizer};
use crate::utils::errors::{FelicityError, Result};
use crate::utils::logging::{log_event_action, log_notification_skipped};

/// An event together with its effective status at read time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    pub event: Event,
    pub status: EventStatus,
}

#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self { store, notifier, clock }
    }

    /// Create a new draft event owned by the calling organizer
    pub async fn create_event(&self, actor: &Actor, request: CreateEventRequest) -> Result<Event> {
        require_organizer(actor)?;
        let new_event = NewEvent::from_request(actor.user_id, request);
        guard::validate_event_config(&new_event)?;

        let event = self.store.insert_event(new_event).await?;
        log_event_action(event.id, "create", actor.user_id, Some(&event.name));
        Ok(event)
    }

    /// Apply a partial edit, subject to the phase table of the current effective status
    pub async fn edit_event(&self, actor: &Actor, event_id: i64, patch: UpdateEventRequest) -> Result<Event> {
        let event = owned_event(self.store.as_ref(), actor, event_id).await?;
        let now = self.clock.now();
        let status = event.effective_status(now);

        edit_policy::authorize_edit(&event, status, &patch)?;
        let publishing = edit_policy::publishes(&event, &patch);
        let replace_variants = patch.variants.is_some();
        let touched = patch.touched_fields();

        let next = edit_policy::apply(&event, patch);
        // Past draft the phase table is the whole gate: a widened deadline may run past the start
        if status == EventStatus::Draft {
            guard::validate_event_config(&NewEvent::from(&next))?;
        }
        let updated = self.store.update_event(&next, replace_variants).await?;

        let fields: Vec<&str> = touched.iter().map(|field| field.as_str()).collect();
        log_event_action(updated.id, "edit", actor.user_id, Some(&fields.join(",")));

        if publishing {
            self.announce(&updated).await;
        }

        let after = updated.effective_status(now);
        if matches!(after, EventStatus::Completed | EventStatus::Closed) {
            // The edit is already committed; the sweeper retries on failure.
            match self.store.reject_pending_orders(updated.id).await {
                Ok(0) => {}
                Ok(rejected) => {
                    info!(event_id = updated.id, rejected = rejected, status = %after, "Rejected stale pending orders")
                }
                Err(e) => warn!(event_id = updated.id, error = %e, "Failed to reject stale pending orders"),
            }
        }

        Ok(updated)
    }

    /// Delete a draft event
    pub async fn delete_event(&self, actor: &Actor, event_id: i64) -> Result<()> {
        let event = owned_event(self.store.as_ref(), actor, event_id).await?;
        let status = event.effective_status(self.clock.now());
        if status != EventStatus::Draft {
            return Err(FelicityError::InvalidPhase { status, operation: "delete event" });
        }

        self.store.delete_draft_event(event_id).await?;
        log_event_action(event_id, "delete", actor.user_id, None);
        Ok(())
    }

    /// Fetch one event; drafts are visible to their organizer only
    pub async fn get_event(&self, actor: &Actor, event_id: i64) -> Result<EventView> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(FelicityError::EventNotFound { event_id })?;

        let status = event.effective_status(self.clock.now());
        if status == EventStatus::Draft && event.organizer_id != actor.user_id {
            return Err(FelicityError::EventNotFound { event_id });
        }
        Ok(EventView { event, status })
    }

    /// Events created by the calling organizer, drafts included
    pub async fn list_my_events(&self, actor: &Actor) -> Result<Vec<EventView>> {
        require_organizer(actor)?;
        let events = self.store.list_events_by_organizer(actor.user_id).await?;
        Ok(self.views(events))
    }

    /// Events open to browsing: everything that has left draft
    pub async fn list_public_events(&self) -> Result<Vec<EventView>> {
        let events = self.store.list_visible_events().await?;
        Ok(self.views(events))
    }

    /// Remove an organizer account with all its events, registrations and messages
    pub async fn delete_organizer(&self, actor: &Actor, organizer_id: i64) -> Result<()> {
        let is_self = actor.is_organizer() && actor.user_id == organizer_id;
        if !actor.is_admin() && !is_self {
            return Err(FelicityError::Forbidden(
                "Only an admin or the organizer themselves can delete an organizer account".to_string(),
            ));
        }

        self.store.delete_organizer(organizer_id).await?;
        info!(organizer_id = organizer_id, actor_id = actor.user_id, "Organizer account deleted");
        Ok(())
    }

    fn views(&self, events: Vec<Event>) -> Vec<EventView> {
        let now = self.clock.now();
        events
            .into_iter()
            .map(|event| {
                let status = event.effective_status(now);
                EventView { event, status }
            })
            .collect()
    }

    async fn announce(&self, event: &Event) {
        let webhook = match self.store.find_user(event.organizer_id).await {
            Ok(Some(organizer)) => organizer.webhook_url,
            Ok(None) => None,
            Err(e) => {
                debug!(event_id = event.id, error = %e, "Could not load organizer for announcement");
                None
            }
        };

        match webhook {
            Some(url) => dispatch_announcement(self.notifier.clone(), url, event.summary()),
            None => log_notification_skipped("webhook", &format!("event {}", event.id)),
        }
    }
}
