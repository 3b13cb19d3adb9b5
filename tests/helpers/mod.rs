//! Test helpers module
//!
//! Shared fixtures, a recording notifier and engine builders for the
//! integration tests. Service-level tests run against `MemoryStore`; the
//! Postgres tests build their own store through `database`.

#![allow(dead_code)]

pub mod database;
pub mod fixtures;
pub mod notifier;

pub use fixtures::*;
pub use notifier::*;

use std::sync::Arc;

use felicity::database::{MemoryStore, Store};
use felicity::models::{Actor, CreateEventRequest, Event, EventStatus, ParticipantCategory, UpdateEventRequest};
use felicity::services::{Engine, ManualClock};

/// Engine over an in-process store, a manual clock and a recording notifier
pub struct TestEngine {
    pub engine: Engine,
    pub store: Arc<dyn Store>,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let clock = ManualClock::new(base_time());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = Engine::new(store.clone(), notifier.clone(), Arc::new(clock.clone()));
        Self { engine, store, clock, notifier }
    }

    pub async fn organizer(&self) -> Actor {
        self.store
            .create_user(organizer_request())
            .await
            .expect("Failed to create organizer")
            .actor()
    }

    pub async fn participant(&self, category: ParticipantCategory) -> Actor {
        self.store
            .create_user(participant_request(category))
            .await
            .expect("Failed to create participant")
            .actor()
    }

    pub async fn admin(&self) -> Actor {
        self.store
            .create_user(admin_request())
            .await
            .expect("Failed to create admin")
            .actor()
    }

    /// Create an event and move it out of draft
    pub async fn published_event(&self, organizer: &Actor, request: CreateEventRequest) -> Event {
        let draft = self
            .engine
            .events
            .create_event(organizer, request)
            .await
            .expect("Failed to create event");
        self.engine
            .events
            .edit_event(organizer, draft.id, publish())
            .await
            .expect("Failed to publish event")
    }

    pub async fn stock_of(&self, event_id: i64) -> i32 {
        let event = self.store.find_event(event_id).await.unwrap().unwrap();
        event.variants[0].stock
    }
}

pub fn publish() -> UpdateEventRequest {
    set_status(EventStatus::Published)
}

pub fn set_status(status: EventStatus) -> UpdateEventRequest {
    UpdateEventRequest {
        status_override: Some(status),
        ..Default::default()
    }
}
