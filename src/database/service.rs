//! Database service layer
//! 
//! This module provides the Postgres-backed `Store` by aggregating the
//! repositories over one pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::{DatabasePool, EventRepository, RegistrationRepository, Store, UserRepository};
use crate::models::*;
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub users: UserRepository,
    pub events: EventRepository,
    pub registrations: RegistrationRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool),
        }
    }
}

#[async_trait]
impl Store for DatabaseService {
    async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        self.users.create(request).await
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        self.users.find_by_id(user_id).await
    }

    async fn delete_organizer(&self, organizer_id: i64) -> Result<()> {
        self.users.delete_organizer(organizer_id).await
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        self.events.create(event).await
    }

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>> {
        self.events.find_by_id(event_id).await
    }

    async fn update_event(&self, event: &Event, replace_variants: bool) -> Result<Event> {
        self.events.update(event, replace_variants).await
    }

    async fn delete_draft_event(&self, event_id: i64) -> Result<()> {
        self.events.delete_draft(event_id).await
    }

    async fn list_events_by_organizer(&self, organizer_id: i64) -> Result<Vec<Event>> {
        self.events.list_by_organizer(organizer_id).await
    }

    async fn list_visible_events(&self) -> Result<Vec<Event>> {
        self.events.list_visible().await
    }

    async fn list_events_with_pending_orders(&self) -> Result<Vec<Event>> {
        self.events.list_with_pending_orders().await
    }

    async fn insert_registration(&self, registration: NewRegistration, guard: InsertGuard) -> Result<Registration> {
        self.registrations.insert(registration, guard).await
    }

    async fn find_registration(&self, registration_id: i64) -> Result<Option<Registration>> {
        self.registrations.find_by_id(registration_id).await
    }

    async fn find_registration_by_ticket(&self, ticket_id: &str) -> Result<Option<Registration>> {
        self.registrations.find_by_ticket(ticket_id).await
    }

    async fn list_registrations(&self, event_id: i64) -> Result<Vec<Registration>> {
        self.registrations.list_for_event(event_id).await
    }

    async fn list_participant_registrations(&self, participant_id: i64) -> Result<Vec<Registration>> {
        self.registrations.list_for_participant(participant_id).await
    }

    async fn ordered_quantity(&self, event_id: i64, participant_id: i64) -> Result<i64> {
        self.registrations.ordered_quantity(event_id, participant_id).await
    }

    async fn attach_payment_proof(&self, registration_id: i64, proof_url: &str) -> Result<Registration> {
        self.registrations.attach_payment_proof(registration_id, proof_url).await
    }

    async fn decide_order(&self, registration_id: i64, decision: OrderDecision) -> Result<Registration> {
        self.registrations.decide(registration_id, decision).await
    }

    async fn reject_pending_orders(&self, event_id: i64) -> Result<u64> {
        self.registrations.reject_pending(event_id).await
    }

    async fn mark_attended(&self, registration_id: i64, at: DateTime<Utc>) -> Result<AttendanceMark> {
        self.registrations.mark_attended(registration_id, at).await
    }

    async fn override_attendance(
        &self,
        registration_id: i64,
        attended: bool,
        audit: AttendanceOverride,
    ) -> Result<Registration> {
        self.registrations.override_attendance(registration_id, attended, audit).await
    }
}
