//! Storage primitives required by the engine
//!
//! Every method is one unit of work: it either applies completely or leaves
//! storage untouched. The contended guards (duplicate pair, registration
//! limit, variant stock, pending-only order transitions, first scan) are
//! enforced here atomically rather than by a read followed by a write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AttendanceMark, AttendanceOverride, CreateUserRequest, Event, InsertGuard, NewEvent,
    NewRegistration, OrderDecision, Registration, User,
};
use crate::utils::errors::Result;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, request: CreateUserRequest) -> Result<User>;

    async fn find_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Remove an organizer together with their events, the registrations and
    /// forum messages of those events, in one transaction
    async fn delete_organizer(&self, organizer_id: i64) -> Result<()>;

    async fn insert_event(&self, event: NewEvent) -> Result<Event>;

    async fn find_event(&self, event_id: i64) -> Result<Option<Event>>;

    /// Persist `event` if its `version` still matches storage, bumping it.
    /// Variants are rewritten only when `replace_variants` is set so that
    /// concurrent stock decrements are never overwritten.
    async fn update_event(&self, event: &Event, replace_variants: bool) -> Result<Event>;

    /// Delete a draft event and its registrations; fails on any other status
    async fn delete_draft_event(&self, event_id: i64) -> Result<()>;

    async fn list_events_by_organizer(&self, organizer_id: i64) -> Result<Vec<Event>>;

    /// Every event that has left draft
    async fn list_visible_events(&self) -> Result<Vec<Event>>;

    /// Events still holding at least one pending order
    async fn list_events_with_pending_orders(&self) -> Result<Vec<Event>>;

    /// Insert a registration under `guard`:
    /// the (event, participant) pair must be new, and depending on the guard
    /// the capacity count or the variant stock is checked and updated in the
    /// same unit of work.
    async fn insert_registration(&self, registration: NewRegistration, guard: InsertGuard) -> Result<Registration>;

    async fn find_registration(&self, registration_id: i64) -> Result<Option<Registration>>;

    async fn find_registration_by_ticket(&self, ticket_id: &str) -> Result<Option<Registration>>;

    async fn list_registrations(&self, event_id: i64) -> Result<Vec<Registration>>;

    async fn list_participant_registrations(&self, participant_id: i64) -> Result<Vec<Registration>>;

    /// Units ordered so far by a participant for an event, rejected orders excluded
    async fn ordered_quantity(&self, event_id: i64, participant_id: i64) -> Result<i64>;

    /// Attach a payment proof; only legal while the order is pending
    async fn attach_payment_proof(&self, registration_id: i64, proof_url: &str) -> Result<Registration>;

    /// Move a pending order to its terminal state. Approval decrements the
    /// variant stock conditionally and stores the ticket in the same unit;
    /// insufficient stock leaves the order pending.
    async fn decide_order(&self, registration_id: i64, decision: OrderDecision) -> Result<Registration>;

    /// Reject every pending order of an event, returning how many changed
    async fn reject_pending_orders(&self, event_id: i64) -> Result<u64>;

    /// Flip attendance false -> true once; a repeat reports the stored record
    async fn mark_attended(&self, registration_id: i64, at: DateTime<Utc>) -> Result<AttendanceMark>;

    /// Unconditional audited overwrite of the attendance flag
    async fn override_attendance(
        &self,
        registration_id: i64,
        attended: bool,
        audit: AttendanceOverride,
    ) -> Result<Registration>;
}
