//! Attendance scanner
//!
//! Scanning is idempotent: the first scan admits, later scans report the
//! original timestamp. Manual overrides always overwrite and are audited.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::Store;
use crate::models::{Actor, AttendanceMark, AttendanceOverride, AttendanceSummary, Registration};
use crate::services::clock::Clock;
use crate::services::owned_event;
use crate::services::ticket::looks_like_ticket;
use crate::utils::errors::{FelicityError, Result};
use crate::utils::helpers::normalize_whitespace;
use crate::utils::logging::log_attendance_override;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Admitted { registration: Registration },
    Duplicate { registration: Registration, first_scanned_at: DateTime<Utc> },
}

impl ScanOutcome {
    pub fn registration(&self) -> &Registration {
        match self {
            ScanOutcome::Admitted { registration } | ScanOutcome::Duplicate { registration, .. } => registration,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ScanOutcome::Duplicate { .. })
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check a ticket in at `event_id`
    pub async fn scan_ticket(&self, actor: &Actor, event_id: i64, ticket_id: &str) -> Result<ScanOutcome> {
        owned_event(self.store.as_ref(), actor, event_id).await?;

        let ticket_id = ticket_id.trim();
        if !looks_like_ticket(ticket_id) {
            return Err(FelicityError::TicketNotFound { ticket_id: ticket_id.to_string() });
        }
        let registration = self
            .store
            .find_registration_by_ticket(ticket_id)
            .await?
            .ok_or_else(|| FelicityError::TicketNotFound { ticket_id: ticket_id.to_string() })?;
        if registration.event_id != event_id {
            return Err(FelicityError::TicketEventMismatch { ticket_id: ticket_id.to_string(), event_id });
        }

        match self.store.mark_attended(registration.id, self.clock.now()).await? {
            AttendanceMark::Marked(registration) => {
                debug!(registration_id = registration.id, event_id = event_id, "Ticket admitted");
                Ok(ScanOutcome::Admitted { registration })
            }
            AttendanceMark::AlreadyAttended(registration) => {
                let first_scanned_at = registration.attended_at.unwrap_or(registration.updated_at);
                debug!(registration_id = registration.id, event_id = event_id, "Duplicate scan");
                Ok(ScanOutcome::Duplicate { registration, first_scanned_at })
            }
        }
    }

    /// Organizer correction of attendance; always overwrites
    pub async fn override_attendance(
        &self,
        actor: &Actor,
        registration_id: i64,
        attended: bool,
        reason: &str,
    ) -> Result<Registration> {
        let reason = normalize_whitespace(reason);
        if reason.is_empty() {
            return Err(FelicityError::InvalidInput("A reason is required for manual attendance".to_string()));
        }

        let registration = self
            .store
            .find_registration(registration_id)
            .await?
            .ok_or(FelicityError::RegistrationNotFound { registration_id })?;
        owned_event(self.store.as_ref(), actor, registration.event_id).await?;
        // Tickets are never revoked, so a confirmed registration stays confirmed
        if !registration.is_confirmed() {
            return Err(FelicityError::InvalidInput(format!(
                "Registration {} holds no ticket; attendance applies only to confirmed registrations",
                registration_id
            )));
        }

        let audit = AttendanceOverride {
            reason,
            actor_id: actor.user_id,
            overridden_at: self.clock.now(),
        };
        let updated = self.store.override_attendance(registration_id, attended, audit).await?;

        if let Some(ref audit) = updated.attendance_override {
            log_attendance_override(updated.id, audit.actor_id, attended, &audit.reason);
        }
        Ok(updated)
    }

    /// Every registration of an event, for its organizer
    pub async fn list_registrations(&self, actor: &Actor, event_id: i64) -> Result<Vec<Registration>> {
        owned_event(self.store.as_ref(), actor, event_id).await?;
        let mut registrations = self.store.list_registrations(event_id).await?;
        registrations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(registrations)
    }

    pub async fn summary(&self, actor: &Actor, event_id: i64) -> Result<AttendanceSummary> {
        let registrations = self.list_registrations(actor, event_id).await?;
        Ok(AttendanceSummary::from_registrations(event_id, &registrations))
    }
}
