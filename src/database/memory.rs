//! In-process store
//!
//! Keeps every table behind one async mutex, so each trait call is
//! serialized and therefore atomic. Used by the test suite and for
//! single-node development runs without Postgres.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::database::store::Store;
use crate::models::{
    AttendanceMark, AttendanceOverride, CreateUserRequest, Event, EventStatus, InsertGuard,
    NewEvent, NewRegistration, OrderDecision, PaymentStatus, Registration, Role, User,
};
use crate::utils::errors::{FelicityError, Result};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    events: BTreeMap<i64, Event>,
    registrations: BTreeMap<i64, Registration>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn registration_mut(&mut self, registration_id: i64) -> Result<&mut Registration> {
        self.registrations
            .get_mut(&registration_id)
            .ok_or(FelicityError::RegistrationNotFound { registration_id })
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == request.email) {
            return Err(FelicityError::InvalidInput(format!("Email {} is already in use", request.email)));
        }
        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            role: request.role,
            category: request.category,
            webhook_url: request.webhook_url,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn delete_organizer(&self, organizer_id: i64) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match tables.users.get(&organizer_id) {
            Some(user) if user.role == Role::Organizer => {}
            _ => return Err(FelicityError::UserNotFound { user_id: organizer_id }),
        }

        let owned: Vec<i64> = tables
            .events
            .values()
            .filter(|e| e.organizer_id == organizer_id)
            .map(|e| e.id)
            .collect();
        tables.registrations.retain(|_, r| !owned.contains(&r.event_id));
        tables.events.retain(|id, _| !owned.contains(id));
        tables.users.remove(&organizer_id);
        Ok(())
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let event = Event {
            id: tables.next_id(),
            organizer_id: event.organizer_id,
            name: event.name,
            description: event.description,
            kind: event.kind,
            eligibility: event.eligibility,
            tags: event.tags,
            registration_deadline: event.registration_deadline,
            start_time: event.start_time,
            end_time: event.end_time,
            registration_limit: event.registration_limit,
            status_override: EventStatus::Draft,
            registration_fee: event.registration_fee,
            form_fields: event.form_fields,
            form_locked: false,
            variants: event.variants,
            purchase_limit: event.purchase_limit,
            requires_payment_approval: event.requires_payment_approval,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&event_id).cloned())
    }

    async fn update_event(&self, event: &Event, replace_variants: bool) -> Result<Event> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .events
            .get_mut(&event.id)
            .ok_or(FelicityError::EventNotFound { event_id: event.id })?;
        if stored.version != event.version {
            return Err(FelicityError::StaleEvent { event_id: event.id });
        }

        let form_locked = stored.form_locked;
        let variants = std::mem::take(&mut stored.variants);
        *stored = event.clone();
        stored.form_locked = form_locked;
        if !replace_variants {
            stored.variants = variants;
        }
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_draft_event(&self, event_id: i64) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let status = tables
            .events
            .get(&event_id)
            .map(|e| e.status_override)
            .ok_or(FelicityError::EventNotFound { event_id })?;
        if status != EventStatus::Draft {
            return Err(FelicityError::InvalidPhase { status, operation: "delete event" });
        }
        tables.registrations.retain(|_, r| r.event_id != event_id);
        tables.events.remove(&event_id);
        Ok(())
    }

    async fn list_events_by_organizer(&self, organizer_id: i64) -> Result<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables.events.values().filter(|e| e.organizer_id == organizer_id).cloned().collect())
    }

    async fn list_visible_events(&self) -> Result<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .values()
            .filter(|e| e.status_override != EventStatus::Draft)
            .cloned()
            .collect())
    }

    async fn list_events_with_pending_orders(&self) -> Result<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .values()
            .filter(|e| {
                tables
                    .registrations
                    .values()
                    .any(|r| r.event_id == e.id && r.payment_status == PaymentStatus::Pending)
            })
            .cloned()
            .collect())
    }

    async fn insert_registration(&self, registration: NewRegistration, guard: InsertGuard) -> Result<Registration> {
        let mut tables = self.tables.lock().await;
        let event_id = registration.event_id;
        let participant_id = registration.participant_id;

        if !tables.events.contains_key(&event_id) {
            return Err(FelicityError::EventNotFound { event_id });
        }
        if tables
            .registrations
            .values()
            .any(|r| r.event_id == event_id && r.participant_id == participant_id)
        {
            return Err(FelicityError::DuplicateRegistration { event_id, participant_id });
        }

        let taken = tables.registrations.values().filter(|r| r.event_id == event_id).count();
        let event = tables
            .events
            .get_mut(&event_id)
            .ok_or(FelicityError::EventNotFound { event_id })?;

        match guard {
            InsertGuard::Capacity => {
                if let Some(limit) = event.registration_limit {
                    if taken as i64 >= i64::from(limit) {
                        return Err(FelicityError::CapacityExceeded { limit });
                    }
                }
                event.form_locked = true;
            }
            InsertGuard::DecrementStock => {
                let line = registration
                    .order
                    .ok_or_else(|| FelicityError::InvalidInput("Order line missing".to_string()))?;
                let variant = event
                    .variants
                    .iter_mut()
                    .find(|v| v.id == line.variant_id)
                    .ok_or(FelicityError::VariantNotFound { variant_id: line.variant_id })?;
                if variant.stock < line.quantity {
                    return Err(FelicityError::InsufficientStock {
                        variant_id: line.variant_id,
                        requested: line.quantity,
                    });
                }
                variant.stock -= line.quantity;
            }
            InsertGuard::Deferred => {}
        }

        let now = Utc::now();
        let stored = Registration {
            id: tables.next_id(),
            event_id,
            participant_id,
            ticket_id: registration.ticket_id,
            form_answers: registration.form_answers,
            variant_id: registration.order.map(|line| line.variant_id),
            quantity: registration.order.map(|line| line.quantity),
            payment_status: registration.payment_status,
            payment_proof_url: None,
            attended: false,
            attended_at: None,
            attendance_override: None,
            created_at: now,
            updated_at: now,
        };
        tables.registrations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_registration(&self, registration_id: i64) -> Result<Option<Registration>> {
        Ok(self.tables.lock().await.registrations.get(&registration_id).cloned())
    }

    async fn find_registration_by_ticket(&self, ticket_id: &str) -> Result<Option<Registration>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .values()
            .find(|r| r.ticket_id.as_deref() == Some(ticket_id))
            .cloned())
    }

    async fn list_registrations(&self, event_id: i64) -> Result<Vec<Registration>> {
        let tables = self.tables.lock().await;
        Ok(tables.registrations.values().filter(|r| r.event_id == event_id).cloned().collect())
    }

    async fn list_participant_registrations(&self, participant_id: i64) -> Result<Vec<Registration>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .values()
            .filter(|r| r.participant_id == participant_id)
            .cloned()
            .collect())
    }

    async fn ordered_quantity(&self, event_id: i64, participant_id: i64) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .values()
            .filter(|r| {
                r.event_id == event_id
                    && r.participant_id == participant_id
                    && r.payment_status != PaymentStatus::Rejected
            })
            .filter_map(|r| r.quantity)
            .map(i64::from)
            .sum())
    }

    async fn attach_payment_proof(&self, registration_id: i64, proof_url: &str) -> Result<Registration> {
        let mut tables = self.tables.lock().await;
        let registration = tables.registration_mut(registration_id)?;
        if registration.payment_status != PaymentStatus::Pending {
            return Err(FelicityError::transition(registration.payment_status, "proof attached"));
        }
        registration.payment_proof_url = Some(proof_url.to_string());
        registration.updated_at = Utc::now();
        Ok(registration.clone())
    }

    async fn decide_order(&self, registration_id: i64, decision: OrderDecision) -> Result<Registration> {
        let mut tables = self.tables.lock().await;
        let (event_id, status, line) = {
            let r = tables.registration_mut(registration_id)?;
            (r.event_id, r.payment_status, r.variant_id.zip(r.quantity))
        };
        let target = match decision {
            OrderDecision::Approve { .. } => PaymentStatus::Approved,
            OrderDecision::Reject => PaymentStatus::Rejected,
        };
        if status != PaymentStatus::Pending {
            return Err(FelicityError::transition(status, target));
        }

        if let OrderDecision::Approve { .. } = decision {
            let (variant_id, quantity) =
                line.ok_or_else(|| FelicityError::InvalidInput("Registration is not an order".to_string()))?;
            let event = tables
                .events
                .get_mut(&event_id)
                .ok_or(FelicityError::EventNotFound { event_id })?;
            let variant = event
                .variants
                .iter_mut()
                .find(|v| v.id == variant_id)
                .ok_or(FelicityError::VariantNotFound { variant_id })?;
            if variant.stock < quantity {
                return Err(FelicityError::InsufficientStock { variant_id, requested: quantity });
            }
            variant.stock -= quantity;
        }

        let registration = tables.registration_mut(registration_id)?;
        registration.payment_status = target;
        if let OrderDecision::Approve { ticket_id } = decision {
            registration.ticket_id = Some(ticket_id);
        }
        registration.updated_at = Utc::now();
        Ok(registration.clone())
    }

    async fn reject_pending_orders(&self, event_id: i64) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut rejected = 0;
        for registration in tables
            .registrations
            .values_mut()
            .filter(|r| r.event_id == event_id && r.payment_status == PaymentStatus::Pending)
        {
            registration.payment_status = PaymentStatus::Rejected;
            registration.updated_at = now;
            rejected += 1;
        }
        Ok(rejected)
    }

    async fn mark_attended(&self, registration_id: i64, at: DateTime<Utc>) -> Result<AttendanceMark> {
        let mut tables = self.tables.lock().await;
        let registration = tables.registration_mut(registration_id)?;
        if registration.attended {
            return Ok(AttendanceMark::AlreadyAttended(registration.clone()));
        }
        registration.attended = true;
        registration.attended_at = Some(at);
        registration.updated_at = at;
        Ok(AttendanceMark::Marked(registration.clone()))
    }

    async fn override_attendance(
        &self,
        registration_id: i64,
        attended: bool,
        audit: AttendanceOverride,
    ) -> Result<Registration> {
        let mut tables = self.tables.lock().await;
        let registration = tables.registration_mut(registration_id)?;
        registration.attended = attended;
        registration.attended_at = attended.then_some(audit.overridden_at);
        registration.updated_at = audit.overridden_at;
        registration.attendance_override = Some(audit);
        Ok(registration.clone())
    }
}
